//! Pointing the bundler's configuration at an installed runtime.
//!
//! The bundler reads the runtime location from
//! `tauri.bundle.windows.webviewInstallMode.path` in its JSON configuration.
//! [`patch_config`] rewrites that one field and writes the whole document
//! back, formatted with the project's indentation rules when it has any.
//!
//! The rewrite is destructive: no backup of the previous file is kept.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::FetchError;
use crate::resolver::InstallationTarget;

/// Default location of the bundler configuration, relative to the project root.
pub const DEFAULT_CONFIG_FILE: &str = "src-tauri/tauri.conf.json";

/// Object keys leading to the install-mode section.
const INSTALL_MODE_SECTION: [&str; 4] = ["tauri", "bundle", "windows", "webviewInstallMode"];

/// Field inside the install-mode section that holds the runtime path.
const PATH_FIELD: &str = "path";

/// Install mode written when the section has to be created.
const FIXED_RUNTIME_MODE: &str = "fixedRuntime";

/// Formatting-rule files consulted, nearest directory first.
const FORMAT_RULE_FILES: [&str; 2] = [".prettierrc", ".prettierrc.json"];

/// Indentation used when the project has no formatting rules.
const DEFAULT_INDENT: &str = "  ";

/// Sets the runtime path in `config_path` to `./<target>/` and rewrites the file.
///
/// Missing sections on the way to the field are created. A newly created
/// install-mode section also gets `"type": "fixedRuntime"`.
///
/// # Errors
///
/// Returns `ConfigUpdateFailed` if the file is missing, unreadable, not JSON,
/// has a non-object where a section is expected, or cannot be written.
pub fn patch_config(config_path: &Path, target: &InstallationTarget) -> Result<(), FetchError> {
    let mut document = read_document(config_path)?;

    set_install_path(&mut document, &target.config_path())
        .map_err(|message| FetchError::config_update_failed(config_path, message))?;

    let indent = format_indent(config_path);
    let mut output = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut output, formatter);
    document.serialize(&mut serializer).map_err(|e| {
        FetchError::config_update_failed_with_source(config_path, "failed to serialize", Box::new(e))
    })?;
    output.push(b'\n');

    std::fs::write(config_path, output).map_err(|e| {
        FetchError::config_update_failed_with_source(config_path, "failed to write", Box::new(e))
    })?;

    debug!(
        "Set webviewInstallMode.path to {} in {}",
        target.config_path(),
        config_path.display()
    );
    Ok(())
}

/// Reads the runtime path currently set in `config_path`, if any.
///
/// # Errors
///
/// Returns `ConfigUpdateFailed` if the file is missing, unreadable, or not JSON.
pub fn read_install_path(config_path: &Path) -> Result<Option<String>, FetchError> {
    let document = read_document(config_path)?;
    let mut section = &document;
    for key in INSTALL_MODE_SECTION {
        match section.get(key) {
            Some(next) => section = next,
            None => return Ok(None),
        }
    }
    Ok(section
        .get(PATH_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string))
}

fn read_document(config_path: &Path) -> Result<Value, FetchError> {
    let text = std::fs::read_to_string(config_path).map_err(|e| {
        FetchError::config_update_failed_with_source(config_path, "failed to read", Box::new(e))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        FetchError::config_update_failed_with_source(config_path, "not valid JSON", Box::new(e))
    })
}

fn set_install_path(document: &mut Value, path: &str) -> Result<(), String> {
    let mut section = document
        .as_object_mut()
        .ok_or_else(|| "configuration root is not an object".to_string())?;

    for (depth, key) in INSTALL_MODE_SECTION.iter().enumerate() {
        let is_install_mode = depth == INSTALL_MODE_SECTION.len() - 1;
        let next = section.entry(*key).or_insert_with(|| {
            let mut fresh = Map::new();
            if is_install_mode {
                fresh.insert("type".to_string(), Value::from(FIXED_RUNTIME_MODE));
            }
            Value::Object(fresh)
        });
        section = next.as_object_mut().ok_or_else(|| {
            format!(
                "'{}' is not an object",
                INSTALL_MODE_SECTION[..=depth].join(".")
            )
        })?;
    }

    section.insert(PATH_FIELD.to_string(), Value::from(path));
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FormatRules {
    use_tabs: Option<bool>,
    tab_width: Option<usize>,
}

impl FormatRules {
    fn indent(&self) -> String {
        if self.use_tabs == Some(true) {
            "\t".to_string()
        } else {
            self.tab_width
                .map_or_else(|| DEFAULT_INDENT.to_string(), |width| " ".repeat(width))
        }
    }
}

/// Returns the indentation for `config_path` from the nearest formatting-rule file.
///
/// Rule files that are not JSON are skipped; without any, two spaces are used.
fn format_indent(config_path: &Path) -> String {
    find_format_rules(config_path)
        .map_or_else(|| DEFAULT_INDENT.to_string(), |rules| rules.indent())
}

fn find_format_rules(config_path: &Path) -> Option<FormatRules> {
    let absolute = std::path::absolute(config_path).unwrap_or_else(|_| PathBuf::from(config_path));
    let start = absolute.parent()?;

    start
        .ancestors()
        .flat_map(|dir| FORMAT_RULE_FILES.iter().map(move |name| dir.join(name)))
        .filter_map(|candidate| std::fs::read_to_string(&candidate).ok().map(|text| (candidate, text)))
        .find_map(|(candidate, text)| match serde_json::from_str::<FormatRules>(&text) {
            Ok(rules) => {
                debug!("Using formatting rules from {}", candidate.display());
                Some(rules)
            }
            Err(_) => {
                debug!("Skipping non-JSON formatting rules at {}", candidate.display());
                None
            }
        })
}
