// Geoprocessing tasks: parameters, choice lists and the filled-in execute form

use crate::panel::display_value;
use arcprobe_scanner::links::strip_query;
use arcprobe_scanner::transport::json_url;
use arcprobe_scanner::{ProbeError, Transport};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Print task input filled from settings when left empty.
pub const WEB_MAP_PARAMETER: &str = "Web_Map_as_JSON";

const OUTPUT_DIRECTION: &str = "esriGPParameterDirectionOutput";
const SYNCHRONOUS: &str = "esriExecutionTypeSynchronous";

static TASK_OPERATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/(execute|submitjob)/?$").expect("valid task operation pattern"));

#[derive(Error, Debug)]
pub enum GpError {
    #[error("Could not find GP parameters for this task")]
    NoParameters,

    #[error("The task has no input parameter named {0}")]
    UnknownParameter(String),

    #[error("'{value}' is not a choice for {name} (choices: {choices})")]
    NotAChoice {
        name: String,
        value: String,
        choices: String,
    },

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpParameter {
    pub name: String,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub parameter_type: Option<String>,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub choice_list: Option<Vec<Value>>,
}

impl GpParameter {
    pub fn is_input(&self) -> bool {
        self.direction.as_deref() != Some(OUTPUT_DIRECTION)
    }

    pub fn choices(&self) -> Vec<String> {
        self.choice_list
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(display_value)
            .collect()
    }

    /// The default as form text. Structured defaults are sent as JSON.
    pub fn default_text(&self) -> Option<String> {
        match self.default_value.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// What the input ends up holding: the entered value, else the default.
    pub fn initial_value(&self, entered: Option<&str>) -> Option<String> {
        entered
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| self.default_text())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpTask {
    pub url: String,
    #[serde(default)]
    pub execution_type: Option<String>,
    pub parameters: Vec<GpParameter>,
}

impl GpTask {
    /// Read a task document. `None` when it carries no parameters.
    pub fn from_doc(url: &str, doc: &Value) -> Option<Self> {
        let parameters = doc
            .get("parameters")
            .and_then(Value::as_array)?
            .iter()
            .filter_map(|param| serde_json::from_value(param.clone()).ok())
            .collect();
        Some(Self {
            url: task_url(url),
            execution_type: doc
                .get("executionType")
                .and_then(Value::as_str)
                .map(str::to_string),
            parameters,
        })
    }

    pub fn is_synchronous(&self) -> bool {
        self.execution_type.as_deref() == Some(SYNCHRONOUS)
    }

    pub fn operation(&self) -> &'static str {
        if self.is_synchronous() {
            "execute"
        } else {
            "submitJob"
        }
    }

    /// Values for every input that has one, in parameter order.
    ///
    /// `entered` values win over defaults and must be one of the listed
    /// choices when the parameter has a choice list. An empty web map input
    /// gets `web_map_default`.
    pub fn form(
        &self,
        entered: &[(String, String)],
        web_map_default: &str,
    ) -> Result<Vec<(String, String)>, GpError> {
        let inputs: Vec<&GpParameter> = self.parameters.iter().filter(|p| p.is_input()).collect();
        if let Some((name, _)) = entered
            .iter()
            .find(|(name, _)| !inputs.iter().any(|p| &p.name == name))
        {
            return Err(GpError::UnknownParameter(name.clone()));
        }

        let mut form = Vec::new();
        for param in inputs {
            let typed = entered
                .iter()
                .rev()
                .find(|(name, _)| name == &param.name)
                .map(|(_, value)| value.as_str());

            let choices = param.choices();
            if let Some(value) = typed
                && !choices.is_empty()
                && !choices.iter().any(|choice| choice == value)
            {
                return Err(GpError::NotAChoice {
                    name: param.name.clone(),
                    value: value.to_string(),
                    choices: choices.join(", "),
                });
            }

            let mut value = param.initial_value(typed);
            if param.name == WEB_MAP_PARAMETER
                && value.as_deref().is_none_or(|v| v.trim().is_empty())
                && !web_map_default.is_empty()
            {
                value = Some(web_map_default.to_string());
            }
            if let Some(value) = value.filter(|value| !value.is_empty()) {
                form.push((param.name.clone(), value));
            }
        }
        Ok(form)
    }

    pub fn execute_url(&self, form: &[(String, String)]) -> Result<Url, ProbeError> {
        let mut url = Url::parse(&format!("{}/{}", self.url, self.operation()))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in form {
                pairs.append_pair(name, value);
            }
            pairs.append_pair("f", "json");
        }
        Ok(url)
    }
}

/// The task URL behind an `execute` or `submitJob` page.
pub fn task_url(url: &str) -> String {
    let base = strip_query(url);
    TASK_OPERATION
        .replace(base, "")
        .trim_end_matches('/')
        .to_string()
}

pub async fn fetch_gp_task(transport: &dyn Transport, url: &str) -> Result<GpTask, GpError> {
    let task = task_url(url);
    let doc = transport.get_json(&json_url(&task)?).await?;
    let task = GpTask::from_doc(&task, &doc).ok_or(GpError::NoParameters)?;
    info!("{}: {} parameter(s)", task.url, task.parameters.len());
    debug!("Execution type: {:?}", task.execution_type);
    Ok(task)
}
