use crate::tracker::*;

use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "trackerName")]
    pub tracker_name: Option<String>,
    #[serde(rename = "outputFile")]
    pub output_file: Option<String>,
    pub format: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PeriodSettings {
    pub month: u32,
    pub week: u32,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "fileType")]
    pub file_type: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

/// The two kinds of assessment sources.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Provider {
    Manual,
    ServiceNow,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum FileType {
    Excel,
    Csv,
}

impl FileSource {
    pub fn new(provider: Provider, file_path: &str, worksheet: Option<String>) -> FileSource {
        FileSource {
            provider: match provider {
                Provider::Manual => "manual".to_string(),
                Provider::ServiceNow => "servicenow".to_string(),
            },
            file_path: file_path.to_string(),
            file_type: None,
            excel_worksheet_name: worksheet,
        }
    }

    pub fn provider(&self) -> TrackerResult<Provider> {
        match self.provider.to_lowercase().replace(['_', '-', ' '], "").as_str() {
            "manual" => Ok(Provider::Manual),
            "servicenow" | "sn" => Ok(Provider::ServiceNow),
            _ => UnknownProviderSnafu {
                provider: self.provider.clone(),
            }
            .fail(),
        }
    }

    /// The explicit file type, or the one given by the file extension.
    pub fn file_type(&self) -> TrackerResult<FileType> {
        let t = match &self.file_type {
            Some(t) => t.to_lowercase(),
            None => Path::new(&self.file_path)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_default(),
        };
        match t.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" | "excel" => Ok(FileType::Excel),
            "csv" => Ok(FileType::Csv),
            _ => UnknownFileTypeSnafu {
                path: self.file_path.clone(),
            }
            .fail(),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmSettings {
    pub enabled: Option<bool>,
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    #[serde(rename = "maxTokens")]
    pub max_tokens: Option<u32>,
    #[serde(rename = "timeoutSecs")]
    pub timeout_secs: Option<u64>,
    #[serde(rename = "keyEnvPrefix")]
    pub key_env_prefix: Option<String>,
    #[serde(rename = "maxKeys")]
    pub max_keys: Option<usize>,
    #[serde(rename = "probeKeys")]
    pub probe_keys: Option<bool>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: Option<OutputSettings>,
    pub period: Option<PeriodSettings>,
    #[serde(default)]
    pub sources: Vec<FileSource>,
    pub llm: Option<LlmSettings>,
}

pub fn read_config(path: &str) -> TrackerResult<TrackerConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: TrackerConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

/// Resolves the path of a source relative to the directory of the config file.
pub fn resolve_path(root: Option<&Path>, file_path: &str) -> String {
    match root {
        Some(r) if Path::new(file_path).is_relative() => {
            let p: PathBuf = [r, Path::new(file_path)].iter().collect();
            p.as_path().display().to_string()
        }
        _ => file_path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let js = r#"{
            "outputSettings": {"trackerName": "Team A", "outputFile": "out.json", "format": "csv"},
            "period": {"month": 3, "week": 2},
            "sources": [
                {"provider": "manual", "filePath": "manual.xlsx", "excelWorksheetName": "Sheet1"},
                {"provider": "ServiceNow", "filePath": "sn.export", "fileType": "CSV"}
            ],
            "llm": {"model": "llama-3.1-8b-instant", "maxTokens": 300, "probeKeys": false}
        }"#;
        let config: TrackerConfig = serde_json::from_str(js).unwrap();
        assert_eq!(config.period, Some(PeriodSettings { month: 3, week: 2 }));
        assert_eq!(config.sources[0].provider().unwrap(), Provider::Manual);
        assert_eq!(config.sources[0].file_type().unwrap(), FileType::Excel);
        assert_eq!(config.sources[1].provider().unwrap(), Provider::ServiceNow);
        assert_eq!(config.sources[1].file_type().unwrap(), FileType::Csv);
        let llm = config.llm.unwrap();
        assert_eq!(llm.max_tokens, Some(300));
        assert_eq!(llm.probe_keys, Some(false));
        assert_eq!(llm.temperature, None);
    }

    #[test]
    fn minimal_config() {
        let config: TrackerConfig = serde_json::from_str("{}").unwrap();
        assert!(config.sources.is_empty());
        assert_eq!(config.llm, None);
    }

    #[test]
    fn unknown_provider_and_file_type() {
        let cfs = FileSource {
            provider: "jira".to_string(),
            file_path: "export.txt".to_string(),
            file_type: None,
            excel_worksheet_name: None,
        };
        assert!(matches!(
            cfs.provider(),
            Err(TrackerError::UnknownProvider { .. })
        ));
        assert!(matches!(
            cfs.file_type(),
            Err(TrackerError::UnknownFileType { .. })
        ));
    }

    #[test]
    fn paths_are_relative_to_the_config() {
        let root = Path::new("/data/week2");
        assert_eq!(
            resolve_path(Some(root), "manual.xlsx"),
            "/data/week2/manual.xlsx"
        );
        assert_eq!(resolve_path(Some(root), "/tmp/sn.csv"), "/tmp/sn.csv");
        assert_eq!(resolve_path(None, "sn.csv"), "sn.csv");
    }
}
