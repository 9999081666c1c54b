//! Will generation.
//!
//! The generator is asked to pull the testator's details out of free text
//! as a JSON object; those details then fill a fixed will template.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use crate::llm::{GenerationOptions, TextGenerator};

pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are a legal assistant helping to extract information for legal documents. Always respond in JSON format.";

/// Details extracted from the user's description. Missing keys are empty.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WillInfo {
    #[serde(deserialize_with = "lenient_string")]
    pub testator_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub testator_father: String,
    #[serde(deserialize_with = "lenient_string")]
    pub age: String,
    #[serde(deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(deserialize_with = "lenient_string")]
    pub executor_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub executor_relation: String,
    #[serde(deserialize_with = "lenient_string")]
    pub spouse_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub num_children: String,
    #[serde(deserialize_with = "lenient_list")]
    pub children_names: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub assets: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub primary_beneficiary: String,
    #[serde(deserialize_with = "lenient_list")]
    pub witnesses: Vec<String>,
}

fn value_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Accept strings, numbers or null.
fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(value_to_string(serde_json::Value::deserialize(d)?))
}

/// Accept an array, a single string, or null.
fn lenient_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(value_to_string)
            .filter(|s| !s.is_empty())
            .collect(),
        serde_json::Value::Null => Vec::new(),
        other => {
            let s = value_to_string(other);
            if s.is_empty() {
                Vec::new()
            } else {
                vec![s]
            }
        }
    })
}

pub fn extraction_prompt(user_input: &str) -> String {
    format!(
        "Extract the following information from the user input to create a will.\n\
         Return only a JSON object with these exact keys (leave empty if information is not provided):\n\n\
         - testator_name: Full name of person making will\n\
         - testator_father: Father's name\n\
         - age: Testator's age\n\
         - address: Complete address\n\
         - executor_name: Name of executor\n\
         - executor_relation: Relationship to testator\n\
         - spouse_name: Name of spouse\n\
         - num_children: Number of children (as digit)\n\
         - children_names: Array of children's names\n\
         - assets: Array of assets\n\
         - primary_beneficiary: Name of main beneficiary\n\
         - witnesses: Array of two witness names\n\n\
         User Input: {}\n\n\
         Respond only with the JSON object, no additional text.",
        user_input
    )
}

/// Parse the outermost `{...}` span of a model reply.
pub fn parse_will_info(reply: &str) -> Result<WillInfo> {
    static JSON_SPAN: OnceLock<Regex> = OnceLock::new();
    let re = JSON_SPAN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex"));
    let span = re
        .find(reply)
        .ok_or_else(|| anyhow!("No valid JSON found in response"))?;
    serde_json::from_str(span.as_str()).map_err(|e| {
        debug!(error = %e, "will extraction JSON rejected");
        anyhow!("Failed to parse LLM response as JSON")
    })
}

/// `"{day} day of {Month}, {Year}"`, e.g. `05 day of March, 2024`.
pub fn formal_date(date: NaiveDate) -> String {
    date.format("%d day of %B, %Y").to_string()
}

pub fn render_will(info: &WillInfo, date: NaiveDate) -> String {
    let children_list = info
        .children_names
        .iter()
        .enumerate()
        .map(|(i, name)| format!("({}) {}", i + 1, name))
        .collect::<Vec<_>>()
        .join("\n");
    let assets_list = info
        .assets
        .iter()
        .map(|a| format!("- {}", a))
        .collect::<Vec<_>>()
        .join("\n");
    let (witness1, witness2) = match info.witnesses.as_slice() {
        [first, second, ..] => (first.as_str(), second.as_str()),
        _ => ("", ""),
    };

    format!(
        "WILL\n\
\n\
I, {name}, son of {father}, aged {age} years, resident of\n\
{address}, do hereby revoke all my former Wills, Codicils and\n\
Testamentary dispositions made by me. I declare this to be my last Will and Testament.\n\
\n\
I maintain good health, and possess a sound mind. This Will is made by me of my own independent\n\
decision and free volition. I have not been influenced, cajoled or coerced in any manner whatsoever.\n\
\n\
I hereby appoint my {executor_relation}, {executor_name}, as the sole Executor of this WILL.\n\
\n\
The name of my spouse is {spouse}. We have {num_children} children namely:\n\
{children_list}\n\
\n\
I own the following immovable and movable assets:\n\
{assets_list}\n\
\n\
All the assets owned by me are self-acquired properties. No one else has any right, title, interest,\n\
claim or demand whatsoever on these assets or properties. I have full right, absolute power and\n\
complete authority on these assets, or in any other property which may be substituted in their place or\n\
places which may be acquired or received by me hereafter.\n\
\n\
I hereby give, devise and bequeath all my properties, whether movable or immovable, whatsoever\n\
and wheresoever to {beneficiary}, absolutely forever.\n\
\n\
IN WITNESS WHEREOF I have hereunto set my hands on this {date} at {address}.\n\
\n\
TESTATOR: {name}\n\
\n\
WITNESSES:\n\
1. {witness1}\n\
2. {witness2}\n",
        name = info.testator_name,
        father = info.testator_father,
        age = info.age,
        address = info.address,
        executor_relation = info.executor_relation,
        executor_name = info.executor_name,
        spouse = info.spouse_name,
        num_children = info.num_children,
        children_list = children_list,
        assets_list = assets_list,
        beneficiary = info.primary_beneficiary,
        date = formal_date(date),
        witness1 = witness1,
        witness2 = witness2,
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedWill {
    pub will: String,
    pub info: WillInfo,
}

pub struct WillGenerator {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
}

impl WillGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, options: GenerationOptions) -> Self {
        Self {
            generator,
            options: options.with_system(EXTRACTION_SYSTEM_PROMPT),
        }
    }

    pub async fn extract(&self, user_input: &str) -> Result<WillInfo> {
        let reply = self
            .generator
            .generate(&extraction_prompt(user_input), &self.options)
            .await?;
        parse_will_info(&reply)
    }

    pub async fn generate(&self, user_input: &str) -> Result<GeneratedWill> {
        let info = self.extract(user_input).await?;
        let will = render_will(&info, chrono::Local::now().date_naive());
        info!(testator = %info.testator_name, "will generated");
        Ok(GeneratedWill { will, info })
    }
}
