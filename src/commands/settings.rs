use super::{CommandError, Result};
use crate::config::SETTING_KEYS;
use crate::db::Database;
use std::collections::BTreeMap;

pub fn get_settings(db: &Database) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for key in SETTING_KEYS {
        if let Some(value) = db.get_setting(key)? {
            map.insert(key.to_string(), value);
        }
    }
    Ok(map)
}

pub fn set_setting(db: &Database, key: &str, value: &str) -> Result<()> {
    check_key(key)?;
    Ok(db.set_setting(key, value)?)
}

pub fn delete_setting(db: &Database, key: &str) -> Result<()> {
    check_key(key)?;
    Ok(db.delete_setting(key)?)
}

fn check_key(key: &str) -> Result<()> {
    if !SETTING_KEYS.contains(&key) {
        return Err(CommandError::UnknownSetting(key.to_string()));
    }
    Ok(())
}
