use crate::model::ScanResult;
use crate::popup::RatePanel;
use anyhow::Result;
use serde_json::json;

pub fn print_json(result: &ScanResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    println!("{}", json);
    Ok(())
}

pub fn rate_panel_json(panel: &RatePanel) -> Result<String> {
    let value = match panel {
        RatePanel::Usage(info) => serde_json::to_value(info)?,
        RatePanel::Unavailable => json!({ "error": "Cannot connect to API server" }),
        RatePanel::Loading => json!({ "status": "loading" }),
    };
    Ok(serde_json::to_string_pretty(&value)?)
}
