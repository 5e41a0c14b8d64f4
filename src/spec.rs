//! Spec extraction: turns the free-text README spec into a structured summary.
//!
//! The README is loose markdown: heading lines (leading `#`) open sections,
//! bullet lines (leading `-` or `*`) add items to the active section. Nothing
//! here ever fails; unrecognized structure simply yields less data.

use serde::{Deserialize, Serialize};

/// Structured summary derived from a README spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub app_name: String,
    pub screens: Vec<String>,
    pub features: Vec<String>,
    pub data_storage_needs: Vec<String>,
}

const DEFAULT_APP_NAME: &str = "MyApp";

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Screens,
    Features,
    Data,
    None,
}

/// Derives a [`Summary`] from raw spec text.
///
/// A heading containing "screen" routes the following bullets to `screens`,
/// "feature" to `features`, "data" or "storage" to `data_storage_needs`
/// (case-insensitive substring match). Any other heading closes the active
/// section, so bullets under it are dropped, as are bullets appearing before
/// the first recognized heading. The first non-blank line, if a heading,
/// supplies the app name.
pub fn summarize(text: &str) -> Summary {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let app_name = lines
        .first()
        .filter(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_APP_NAME.to_string());

    let mut screens = Vec::new();
    let mut features = Vec::new();
    let mut data = Vec::new();
    let mut current = Section::None;

    for line in lines {
        if line.starts_with('#') {
            let header = line.trim_start_matches('#').trim().to_lowercase();
            current = if header.contains("screen") {
                Section::Screens
            } else if header.contains("feature") {
                Section::Features
            } else if header.contains("data") || header.contains("storage") {
                Section::Data
            } else {
                Section::None
            };
            continue;
        }

        if line.starts_with('-') || line.starts_with('*') {
            let item = line.trim_start_matches(['-', '*', ' ']).trim().to_string();
            match current {
                Section::Screens => screens.push(item),
                Section::Features => features.push(item),
                Section::Data => data.push(item),
                Section::None => {}
            }
        }
    }

    Summary {
        app_name,
        screens,
        features,
        data_storage_needs: data,
    }
}
