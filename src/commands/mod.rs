use crate::controller::{OutreachController, COPY_FEEDBACK_DURATION};
use crate::desktop::apply_debug_mode;
use crate::error::AppError;
use crate::outreach::{CopyTarget, EditableField, OutputTab};
use crate::settings::{self, AppSettings};
use crate::view::{build_view, ViewModel};
use std::sync::Arc;
use std::time::Instant;
use tauri::{AppHandle, Manager, State};
use tauri_plugin_opener::OpenerExt;

type Controller<'a> = State<'a, Arc<OutreachController>>;

fn current_view(controller: &OutreachController) -> ViewModel {
    build_view(
        &controller.snapshot(),
        controller.capture_state(),
        Instant::now(),
    )
}

// Failures already landed in the banner; only log here.
fn log_outcome<T>(intent: &str, outcome: Result<T, AppError>) {
    match outcome {
        Ok(_) => {}
        Err(AppError::Busy) => log::debug!("{} ignored: busy", intent),
        Err(e) => log::debug!("{} failed: {}", intent, e),
    }
}

#[tauri::command]
pub fn get_view(controller: Controller<'_>) -> ViewModel {
    current_view(&controller)
}

#[tauri::command]
pub fn set_query(controller: Controller<'_>, query: String) {
    controller.set_query(&query);
}

#[tauri::command]
pub async fn submit_query(
    controller: Controller<'_>,
    query: String,
) -> Result<ViewModel, String> {
    log_outcome("Submit", controller.submit(&query).await);
    Ok(current_view(&controller))
}

#[tauri::command]
pub async fn toggle_microphone(controller: Controller<'_>) -> Result<ViewModel, String> {
    log_outcome("Microphone toggle", controller.toggle_microphone().await);
    Ok(current_view(&controller))
}

#[tauri::command]
pub fn select_tab(controller: Controller<'_>, tab: OutputTab) -> ViewModel {
    controller.select_tab(tab);
    current_view(&controller)
}

#[tauri::command]
pub fn edit_output(controller: Controller<'_>, field: EditableField, value: String) -> bool {
    controller.edit(field, value)
}

#[tauri::command]
pub fn copy_output(controller: Controller<'_>, target: CopyTarget) -> ViewModel {
    if let Ok(true) = controller.copy(target) {
        let controller = controller.inner().clone();
        tauri::async_runtime::spawn(async move {
            tokio::time::sleep(COPY_FEEDBACK_DURATION).await;
            controller.expire_copy_feedback(Instant::now());
        });
    }
    current_view(&controller)
}

#[tauri::command]
pub fn load_past_query(controller: Controller<'_>, id: String) -> Result<ViewModel, String> {
    let lead = controller
        .lead_by_id(&id)
        .ok_or_else(|| format!("No past signal with id {}", id))?;
    controller.load_past_query(&lead);
    Ok(current_view(&controller))
}

#[tauri::command]
pub fn dismiss_error(controller: Controller<'_>) -> ViewModel {
    controller.dismiss_error();
    current_view(&controller)
}

#[tauri::command]
pub fn open_source_link(app: AppHandle, uri: String) -> Result<(), String> {
    if !(uri.starts_with("https://") || uri.starts_with("http://")) {
        return Err(format!("Refusing to open non-web link: {}", uri));
    }
    app.opener()
        .open_url(uri, None::<&str>)
        .map_err(|e| format!("Failed to open link: {}", e))
}

/// Stored settings with the API key masked.
#[tauri::command]
pub fn get_app_settings(app: AppHandle) -> AppSettings {
    let mut settings = settings::get_settings(&app);
    if settings.api_key.is_some() {
        settings.api_key = Some("********".to_string());
    }
    settings
}

#[tauri::command]
pub fn change_debug_mode_setting(app: AppHandle, enabled: bool) -> Result<(), String> {
    let mut settings = settings::get_settings(&app);
    settings.debug_mode = enabled;
    settings::write_settings(&app, &settings)?;
    apply_debug_mode(enabled);
    Ok(())
}

#[tauri::command]
pub fn get_log_dir_path(app: AppHandle) -> Result<String, String> {
    let log_dir = app
        .path()
        .app_log_dir()
        .map_err(|e| format!("Failed to get log directory: {}", e))?;

    Ok(log_dir.to_string_lossy().to_string())
}
