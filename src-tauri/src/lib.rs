use std::sync::{Arc, Mutex};

use remedy_core::{
    AiSettings, AnalyzeCodeInput, AnalyzeCodeOutput, CodeInputForm, FormErrors, Language,
    SuggestFixesInput, SuggestFixesOutput, DEFAULT_LANGUAGE,
};
use remedy_suggest::{ActionResult, DisplayField, FlowController, FlowState, SubmissionOutcome};
use serde::Serialize;
use tauri::{Emitter, Manager};
use tauri_plugin_clipboard_manager::ClipboardExt;
use tauri_plugin_dialog::DialogExt;
use tokio::sync::broadcast::error::RecvError;

/// Managed state: the flow controller and the AI settings it was built from.
struct AppState {
    flow: Arc<FlowController>,
    settings: Arc<Mutex<AiSettings>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LanguageOption {
    id: &'static str,
    label: &'static str,
    is_default: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadedFile {
    name: String,
    code: String,
}

/// What the page shows after a copy attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct CopyFeedback {
    copied: bool,
    title: &'static str,
    description: String,
}

/// Copy what `state` displays for `field` through `write`.
fn copy_field<E: std::fmt::Display>(
    state: &FlowState,
    field: DisplayField,
    write: impl FnOnce(String) -> Result<(), E>,
) -> CopyFeedback {
    let failed = || CopyFeedback {
        copied: false,
        title: "Copy Failed",
        description: format!("Could not copy {}. Please try again.", field.label()),
    };
    let Some(text) = state.display_text(field) else {
        log::warn!("nothing displayed for {:?}", field);
        return failed();
    };
    match write(text) {
        Ok(()) => CopyFeedback {
            copied: true,
            title: "Copied to clipboard!",
            description: format!("{} has been copied.", field.label()),
        },
        Err(e) => {
            log::error!("failed to copy {:?}: {}", field, e);
            failed()
        }
    }
}

fn language_options() -> Vec<LanguageOption> {
    Language::ALL
        .iter()
        .map(|l| LanguageOption {
            id: l.id(),
            label: l.label(),
            is_default: *l == DEFAULT_LANGUAGE,
        })
        .collect()
}

/// Settings as shown to the page: the API key is never sent, only whether it is set.
fn masked_settings(settings: &AiSettings) -> serde_json::Value {
    serde_json::json!({
        "provider": settings.provider,
        "model": settings.model,
        "hasKey": !settings.api_key.is_empty(),
        "configured": remedy_core::ai_configured(settings),
        "providers": remedy_core::PROVIDERS,
    })
}

/// Empty key means "keep existing".
fn merge_settings(current: &AiSettings, provider: String, api_key: String, model: String) -> AiSettings {
    AiSettings {
        provider: provider.trim().to_ascii_lowercase(),
        model: model.trim().to_string(),
        api_key: if api_key.is_empty() {
            current.api_key.clone()
        } else {
            api_key
        },
    }
}

#[tauri::command]
fn list_languages() -> Vec<LanguageOption> {
    language_options()
}

#[tauri::command]
fn get_flow_state(state: tauri::State<'_, AppState>) -> FlowState {
    state.flow.state()
}

#[tauri::command]
async fn submit_code(
    form: CodeInputForm,
    state: tauri::State<'_, AppState>,
) -> Result<SubmissionOutcome, FormErrors> {
    state.flow.submit(&form).await
}

#[tauri::command]
async fn perform_code_analysis(
    input: AnalyzeCodeInput,
    state: tauri::State<'_, AppState>,
) -> Result<ActionResult<AnalyzeCodeOutput>, String> {
    let model = remedy_suggest::model_from_settings(&current_settings(&state));
    Ok(remedy_suggest::perform_code_analysis(model.as_ref(), &input).await)
}

#[tauri::command]
async fn perform_suggest_fixes(
    input: SuggestFixesInput,
    state: tauri::State<'_, AppState>,
) -> Result<ActionResult<SuggestFixesOutput>, String> {
    let model = remedy_suggest::model_from_settings(&current_settings(&state));
    Ok(remedy_suggest::perform_suggest_fixes(model.as_ref(), &input).await)
}

/// Let the user pick a file and return its full text. `None` if the dialog was cancelled.
#[tauri::command]
async fn pick_code_file(app: tauri::AppHandle) -> Result<Option<LoadedFile>, String> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    app.dialog()
        .file()
        .add_filter("Source files", remedy_core::UPLOAD_EXTENSIONS)
        .pick_file(move |path| {
            let _ = tx.send(path);
        });
    let Some(picked) = rx.await.map_err(|e| e.to_string())? else {
        return Ok(None);
    };
    let path = picked.into_path().map_err(|e| e.to_string())?;
    let code = remedy_core::read_code_file(&path).map_err(|e| {
        log::warn!("upload rejected: {}", e);
        e.to_string()
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(Some(LoadedFile { name, code }))
}

/// Copy what is displayed right now for `field` and report the outcome.
#[tauri::command]
fn copy_to_clipboard(
    field: DisplayField,
    app: tauri::AppHandle,
    state: tauri::State<'_, AppState>,
) -> CopyFeedback {
    copy_field(&state.flow.state(), field, |text| app.clipboard().write_text(text))
}

#[tauri::command]
fn get_ai_settings(state: tauri::State<'_, AppState>) -> Result<serde_json::Value, String> {
    Ok(masked_settings(&current_settings(&state)))
}

#[tauri::command]
fn save_ai_settings(
    provider: String,
    api_key: String,
    model: String,
    state: tauri::State<'_, AppState>,
) -> Result<(), String> {
    let mut settings = state.settings.lock().map_err(|e| e.to_string())?;
    let updated = merge_settings(&settings, provider, api_key, model);
    remedy_core::write_settings(&updated).map_err(|e| e.to_string())?;
    state
        .flow
        .set_model(remedy_suggest::model_from_settings(&updated));
    *settings = updated;
    Ok(())
}

fn current_settings(state: &AppState) -> AiSettings {
    state
        .settings
        .lock()
        .map(|s| s.clone())
        .unwrap_or_default()
}

/// Forward every FlowState change and failure notice to the page.
fn forward_flow_events(app: &tauri::App, flow: &FlowController) {
    let handle = app.handle().clone();
    let mut states = flow.subscribe();
    tauri::async_runtime::spawn(async move {
        while states.changed().await.is_ok() {
            let snapshot = states.borrow_and_update().clone();
            let _ = handle.emit("flow-state", snapshot);
        }
    });

    let handle = app.handle().clone();
    let mut notices = flow.notices();
    tauri::async_runtime::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => {
                    let _ = handle.emit("flow-notice", notice);
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("dropped {} flow notices", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let settings = remedy_core::read_settings();
    let flow = Arc::new(FlowController::new(remedy_suggest::model_from_settings(
        &settings,
    )));
    let settings_state = Arc::new(Mutex::new(settings));

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_clipboard_manager::init())
        .setup(move |app| {
            forward_flow_events(app, &flow);
            app.manage(AppState {
                flow: Arc::clone(&flow),
                settings: Arc::clone(&settings_state),
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            list_languages,
            get_flow_state,
            submit_code,
            perform_code_analysis,
            perform_suggest_fixes,
            pick_code_file,
            copy_to_clipboard,
            get_ai_settings,
            save_ai_settings,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_default_language() {
        let options = language_options();
        assert_eq!(options.len(), Language::ALL.len());
        let defaults: Vec<_> = options.iter().filter(|o| o.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, "javascript");
    }

    fn completed_state() -> FlowState {
        FlowState {
            analysis_result: Some(AnalyzeCodeOutput {
                analysis: "Unused variable.".into(),
            }),
            suggestion_result: Some(SuggestFixesOutput {
                improved_code: "fn main() {}".into(),
                suggestions: vec!["Remove x".into()],
            }),
            ..FlowState::default()
        }
    }

    #[test]
    fn copy_reports_success_with_the_field_name() {
        let mut written = None;
        let feedback = copy_field(&completed_state(), DisplayField::ImprovedCode, |text| {
            written = Some(text);
            Ok::<_, String>(())
        });
        assert_eq!(written.as_deref(), Some("fn main() {}"));
        assert!(feedback.copied);
        assert_eq!(feedback.title, "Copied to clipboard!");
        assert_eq!(feedback.description, "Suggested code has been copied.");
    }

    #[test]
    fn copy_reports_clipboard_errors() {
        let feedback = copy_field(&completed_state(), DisplayField::Analysis, |_| {
            Err("clipboard unavailable")
        });
        assert!(!feedback.copied);
        assert_eq!(feedback.title, "Copy Failed");
        assert_eq!(feedback.description, "Could not copy Analysis. Please try again.");
    }

    #[test]
    fn copy_of_nothing_displayed_is_a_failure() {
        let mut called = false;
        let feedback = copy_field(&FlowState::default(), DisplayField::OriginalCode, |_| {
            called = true;
            Ok::<_, String>(())
        });
        assert!(!called);
        assert!(!feedback.copied);
        assert_eq!(feedback.title, "Copy Failed");
    }

    #[test]
    fn masked_settings_never_include_the_key() {
        let settings = AiSettings {
            provider: "openai".into(),
            api_key: "sk-secret".into(),
            model: "gpt-4o".into(),
        };
        let json = masked_settings(&settings);
        assert!(!json.to_string().contains("sk-secret"));
        assert_eq!(json["hasKey"], true);
        assert_eq!(json["configured"], true);
    }

    #[test]
    fn empty_key_keeps_the_stored_one() {
        let current = AiSettings {
            provider: "openai".into(),
            api_key: "sk-old".into(),
            model: "gpt-4o".into(),
        };
        let merged = merge_settings(&current, " Anthropic ".into(), String::new(), "claude".into());
        assert_eq!(merged.provider, "anthropic");
        assert_eq!(merged.api_key, "sk-old");
        let merged = merge_settings(&current, "openai".into(), "sk-new".into(), "gpt-4o".into());
        assert_eq!(merged.api_key, "sk-new");
    }
}
