//! Prompt text extraction from source chat datasets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Layout of one item in the source JSON array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetType {
    /// `{"conversations": [{"from": "human"|"gpt", "value": ...}, ...]}`
    #[serde(rename = "sharegpt")]
    ShareGpt,
    /// `{"instruction": ..., "input": ..., "output": ...}`
    #[serde(rename = "instruct_coder")]
    InstructCoder,
}

impl DatasetType {
    /// Builds the prompt text for one item.
    pub fn collect_text(&self, item: &Value) -> Result<String> {
        match self {
            Self::ShareGpt => collect_sharegpt(item),
            Self::InstructCoder => collect_instruct_coder(item),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShareGpt => "sharegpt",
            Self::InstructCoder => "instruct_coder",
        }
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sharegpt" => Ok(Self::ShareGpt),
            "instruct_coder" => Ok(Self::InstructCoder),
            other => Err(Error::Config(format!(
                "unknown dataset type '{other}' (expected sharegpt or instruct_coder)"
            ))),
        }
    }
}

/// Where the ShareGPT walk currently is.
#[derive(Clone, Copy)]
enum Turn {
    FirstHuman,
    Reply,
    FollowUp,
}

/// First human turn, the gpt reply after it, then the next human turn.
fn collect_sharegpt(item: &Value) -> Result<String> {
    let turns = item["conversations"]
        .as_array()
        .ok_or_else(|| Error::Dataset("sharegpt item has no 'conversations' array".into()))?;

    let mut text = String::new();
    let mut expecting = Turn::FirstHuman;
    for turn in turns {
        let from = turn["from"].as_str().unwrap_or_default();
        let value = turn["value"].as_str().unwrap_or_default();
        match (expecting, from) {
            (Turn::FirstHuman, "human") => expecting = Turn::Reply,
            (Turn::Reply, "gpt") => expecting = Turn::FollowUp,
            (Turn::FollowUp, "human") => {
                text.push(' ');
                text.push_str(value);
                break;
            }
            _ => continue,
        }
        text.push(' ');
        text.push_str(value);
    }
    Ok(text)
}

fn collect_instruct_coder(item: &Value) -> Result<String> {
    let field = |name: &str| {
        item[name]
            .as_str()
            .ok_or_else(|| Error::Dataset(format!("instruct_coder item has no string '{name}'")))
    };
    Ok(format!(
        "{} {} {}",
        field("instruction")?,
        field("input")?,
        field("output")?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sharegpt_human_gpt_human() {
        let item = json!({
            "conversations": [
                {"from": "system", "value": "ignored"},
                {"from": "human", "value": "hi"},
                {"from": "human", "value": "still waiting"},
                {"from": "gpt", "value": "hello"},
                {"from": "human", "value": "how are you"},
                {"from": "gpt", "value": "never reached"}
            ]
        });
        let text = DatasetType::ShareGpt.collect_text(&item).unwrap();
        assert_eq!(text, " hi hello how are you");
    }

    #[test]
    fn test_sharegpt_short_conversation() {
        let item = json!({"conversations": [{"from": "human", "value": "only"}]});
        assert_eq!(DatasetType::ShareGpt.collect_text(&item).unwrap(), " only");
    }

    #[test]
    fn test_sharegpt_missing_conversations() {
        assert!(DatasetType::ShareGpt.collect_text(&json!({})).is_err());
    }

    #[test]
    fn test_instruct_coder() {
        let item = json!({"instruction": "fix", "input": "x = 1", "output": "x = 2"});
        let text = DatasetType::InstructCoder.collect_text(&item).unwrap();
        assert_eq!(text, "fix x = 1 x = 2");
        assert!(DatasetType::InstructCoder
            .collect_text(&json!({"instruction": "fix"}))
            .is_err());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("sharegpt".parse::<DatasetType>().unwrap(), DatasetType::ShareGpt);
        assert_eq!(
            "instruct_coder".parse::<DatasetType>().unwrap(),
            DatasetType::InstructCoder
        );
        assert!("alpaca".parse::<DatasetType>().is_err());
        assert_eq!(DatasetType::InstructCoder.to_string(), "instruct_coder");
    }
}
