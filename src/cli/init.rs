use std::path::PathBuf;

use crate::error::Result;
use crate::settings::{load_settings, save_settings, settings_file_exists, shellexpand_path};
use crate::store::{get_connection, init_db};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = if settings_file_exists() {
        load_settings()
    } else {
        Default::default()
    };
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }

    let dir = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&dir)?;
    save_settings(&settings)?;

    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;

    println!("Initialized database at {}", settings.db_path().display());
    Ok(())
}
