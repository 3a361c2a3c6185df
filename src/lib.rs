pub mod config;
pub mod error;
pub mod images;
pub mod logging;
pub mod mirror;
pub mod models;
pub mod persistence;
pub mod tree;
pub mod workspace;

#[cfg(feature = "desktop")]
pub mod commands;
#[cfg(feature = "desktop")]
pub mod desktop;

pub use error::{NoteError, Result};
pub use workspace::Workspace;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use std::sync::Arc;

    use tauri::Manager;

    use crate::commands::WorkspaceState;
    use crate::config::PreferencesManager;
    use crate::desktop::DesktopMirror;
    use crate::mirror::FilesystemMirror;
    use crate::persistence::{JsonDirStore, KeyValueStore, Persistence};

    logging::init();

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            // Focus the main window when a second instance is launched
            if let Some(window) = app.get_webview_window("main") {
                let _ = window.set_focus();
                let _ = window.unminimize();
            }
        }))
        .setup(|app| {
            let store: Arc<dyn KeyValueStore> = Arc::new(JsonDirStore::default_location()?);
            let mirror: Arc<dyn FilesystemMirror> = Arc::new(DesktopMirror::new(app.handle().clone()));

            let workspace = Workspace::open(Persistence::new(store.clone()), Some(mirror))?;
            let preferences = PreferencesManager::new(store)?;
            app.manage(WorkspaceState::new(workspace));
            app.manage(preferences);

            #[cfg(debug_assertions)]
            {
                if let Some(window) = app.get_webview_window("main") {
                    window.open_devtools();
                }
            }
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::pick_directory,
            commands::open_workspace,
            commands::open_recent_workspace,
            commands::list_recent_workspaces,
            commands::list_items,
            commands::load_active_item,
            commands::create_note,
            commands::create_folder,
            commands::delete_item,
            commands::delete_items,
            commands::move_item,
            commands::rename_item,
            commands::update_content,
            commands::activate_item,
            commands::import_note,
            commands::export_note,
            commands::insert_image,
            commands::insert_image_bytes,
            commands::render_preview,
            commands::save_workspace,
            commands::get_save_status,
            commands::get_unsynced_note,
            commands::get_preferences,
            commands::set_preferences,
            commands::cycle_preview_mode,
            commands::reset_theme,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            if let tauri::RunEvent::Exit = event {
                if let Some(workspace) = app.try_state::<WorkspaceState>() {
                    match workspace.try_lock() {
                        Ok(workspace) => {
                            if let Err(e) = workspace.flush() {
                                log::error!("Failed to save workspace on exit: {}", e);
                            }
                        }
                        Err(_) => log::warn!("workspace busy on exit, skipping final save"),
                    }
                }
                if let Some(preferences) = app.try_state::<PreferencesManager>() {
                    if let Err(e) = preferences.save_sync() {
                        log::error!("Failed to save preferences on exit: {}", e);
                    }
                }
            }
        });
}
