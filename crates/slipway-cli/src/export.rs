//! Consolidated work-item exports.

use slipway_core::model::WorkItem;

/// Markdown table of the consolidated set.
pub fn to_markdown(items: &[WorkItem]) -> String {
    let mut out = String::from("| ID | Type | Title | State | URL |\n|---|---|---|---|---|\n");
    for item in items {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            item.id,
            item.kind,
            item.title.replace('|', "\\|"),
            item.state,
            item.url
        ));
    }
    out
}

/// CSV rendering of the consolidated set.
pub fn to_csv(items: &[WorkItem]) -> String {
    let mut out = String::from("id,type,title,state,url\n");
    for item in items {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            item.id,
            csv_field(&item.kind),
            csv_field(&item.title),
            csv_field(&item.state),
            csv_field(&item.url)
        ));
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
