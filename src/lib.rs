pub mod cli;
pub mod clipboard;
#[cfg(feature = "desktop")]
mod commands;
pub mod controller;
pub mod error;
pub mod gemini;
pub mod managers;
#[cfg(feature = "desktop")]
mod microphone;
pub mod outreach;
pub mod prompts;
pub mod settings;
pub mod view;

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use crate::cli::CliArgs;
    use crate::clipboard::{PluginClipboard, SystemCommandClipboard};
    use crate::commands;
    use crate::controller::{Collaborators, OutreachController};
    use crate::gemini::GeminiClient;
    use crate::managers::leads::TauriLeadStore;
    use crate::microphone::CpalMicrophone;
    use crate::settings::{load_or_create_app_settings, AppSettings};
    use crate::view::build_view;
    use env_filter::Builder as EnvFilterBuilder;
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;
    use std::time::Instant;
    use tauri::{AppHandle, Emitter, Manager};
    use tauri_plugin_log::{Builder as LogBuilder, RotationStrategy, Target, TargetKind};

    pub const VIEW_CHANGED_EVENT: &str = "view-changed";

    // File log level as a u8-encoded log::LevelFilter, driven by `debug_mode`.
    pub static FILE_LOG_LEVEL: AtomicU8 = AtomicU8::new(log::LevelFilter::Info as u8);

    fn level_filter_from_u8(value: u8) -> log::LevelFilter {
        match value {
            0 => log::LevelFilter::Off,
            1 => log::LevelFilter::Error,
            2 => log::LevelFilter::Warn,
            3 => log::LevelFilter::Info,
            4 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    pub fn apply_debug_mode(enabled: bool) {
        let level = if enabled {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        FILE_LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }

    fn build_console_filter(debug: bool) -> env_filter::Filter {
        let mut builder = EnvFilterBuilder::new();
        let fallback = if debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };

        match std::env::var("RUST_LOG") {
            Ok(spec) if !spec.trim().is_empty() => {
                if let Err(err) = builder.try_parse(&spec) {
                    log::warn!(
                        "Ignoring invalid RUST_LOG value '{}': {}. Falling back to {} console logging",
                        spec,
                        err,
                        fallback
                    );
                    builder.filter_level(fallback);
                }
            }
            _ => {
                builder.filter_level(fallback);
            }
        }

        builder.build()
    }

    fn show_main_window(app: &AppHandle) {
        match app.get_webview_window("main") {
            Some(window) => {
                if let Err(e) = window.show() {
                    log::error!("Failed to show window: {}", e);
                }
                if let Err(e) = window.set_focus() {
                    log::error!("Failed to focus window: {}", e);
                }
            }
            None => log::error!("Main window not found."),
        }
    }

    fn initialize_core_logic(
        app_handle: &AppHandle,
        settings: AppSettings,
        cli_args: &CliArgs,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if settings.effective_api_key().is_none() {
            log::warn!("No Gemini API key configured; research and dictation will fail");
        }

        let controller = Arc::new(OutreachController::new(Collaborators {
            intelligence: Arc::new(GeminiClient::new(settings)?),
            leads: Box::new(TauriLeadStore::new(app_handle)),
            clipboard: Box::new(PluginClipboard::new(app_handle)),
            fallback_clipboard: Box::new(SystemCommandClipboard),
            microphone: Box::new(CpalMicrophone::new()),
        }));

        if let Some(query) = cli_args.query.as_deref() {
            controller.set_query(query);
        }

        let mut changes = controller.subscribe();
        let emitter = app_handle.clone();
        let watched = controller.clone();
        tauri::async_runtime::spawn(async move {
            while changes.changed().await.is_ok() {
                let view = build_view(&watched.snapshot(), watched.capture_state(), Instant::now());
                if let Err(e) = emitter.emit(VIEW_CHANGED_EVENT, &view) {
                    log::warn!("Failed to emit view update: {}", e);
                }
            }
        });

        app_handle.manage(controller);
        Ok(())
    }

    pub fn run(cli_args: CliArgs) {
        let console_filter = build_console_filter(cli_args.debug);
        let setup_args = cli_args.clone();

        let result = tauri::Builder::default()
            .plugin(
                LogBuilder::new()
                    .level(log::LevelFilter::Trace)
                    .max_file_size(500_000)
                    .rotation_strategy(RotationStrategy::KeepOne)
                    .clear_targets()
                    .targets([
                        // Console output respects RUST_LOG
                        Target::new(TargetKind::Stdout).filter({
                            let console_filter = console_filter.clone();
                            move |metadata| console_filter.enabled(metadata)
                        }),
                        Target::new(TargetKind::LogDir {
                            file_name: Some("sahayak-connect".into()),
                        })
                        .filter(|metadata| {
                            let file_level = FILE_LOG_LEVEL.load(Ordering::Relaxed);
                            metadata.level() <= level_filter_from_u8(file_level)
                        }),
                    ])
                    .build(),
            )
            .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
                show_main_window(app);
            }))
            .plugin(tauri_plugin_clipboard_manager::init())
            .plugin(tauri_plugin_opener::init())
            .plugin(tauri_plugin_store::Builder::default().build())
            .setup(move |app| {
                let settings = load_or_create_app_settings(app);
                apply_debug_mode(settings.debug_mode || setup_args.debug);

                let app_handle = app.handle().clone();
                initialize_core_logic(&app_handle, settings, &setup_args)?;

                if !setup_args.start_hidden {
                    show_main_window(&app_handle);
                }
                Ok(())
            })
            .on_window_event(|window, event| {
                if let tauri::WindowEvent::Destroyed = event {
                    if let Some(controller) = window.try_state::<Arc<OutreachController>>() {
                        controller.cancel_recording();
                    }
                }
            })
            .invoke_handler(tauri::generate_handler![
                commands::get_view,
                commands::set_query,
                commands::submit_query,
                commands::toggle_microphone,
                commands::select_tab,
                commands::edit_output,
                commands::copy_output,
                commands::load_past_query,
                commands::dismiss_error,
                commands::open_source_link,
                commands::get_app_settings,
                commands::change_debug_mode_setting,
                commands::get_log_dir_path,
            ])
            .run(tauri::generate_context!());

        if let Err(e) = result {
            log::error!("Error while running tauri application: {}", e);
            std::process::exit(1);
        }
    }
}
