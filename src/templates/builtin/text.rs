use anyhow::anyhow;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde_json::Value;

use crate::command::{Callback, Invocation};
use crate::context::{ContextObject, ExecutionContext};
use crate::message::Reply;

/// Strings stored in `data[key]`, which must be an array of strings.
fn string_list(data: &ContextObject, key: &str) -> anyhow::Result<Vec<String>> {
    let value = data
        .get(key)
        .ok_or_else(|| anyhow!("data.{} is missing", key))?;
    let Value::Array(items) = value else {
        return Err(anyhow!("data.{} must be an array", key));
    };
    Ok(items
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect())
}

fn pick(data: &ContextObject, key: &str) -> anyhow::Result<String> {
    string_list(data, key)?
        .choose(&mut rand::thread_rng())
        .cloned()
        .ok_or_else(|| anyhow!("data.{} is empty", key))
}

/// Replies with a random entry of `data.messages`.
pub struct RandomText;

#[async_trait]
impl Callback for RandomText {
    async fn call(
        &self,
        _invocation: &Invocation<'_>,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<Option<Reply>> {
        Ok(Some(Reply::text(pick(&ctx.data, "messages")?)))
    }
}

/// Replies with one random attachment from `data.files`.
pub struct RandomFile;

#[async_trait]
impl Callback for RandomFile {
    async fn call(
        &self,
        _invocation: &Invocation<'_>,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<Option<Reply>> {
        let file = pick(&ctx.data, "files")?;
        Ok(Some(Reply::with_files("", vec![file])))
    }
}

/// Replies with `data.text` and every attachment in `data.files`.
pub struct StaticReply;

#[async_trait]
impl Callback for StaticReply {
    async fn call(
        &self,
        _invocation: &Invocation<'_>,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<Option<Reply>> {
        let text = ctx
            .data
            .get("text")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let files = if ctx.data.contains_key("files") {
            string_list(&ctx.data, "files")?
        } else {
            Vec::new()
        };

        if files.is_empty() {
            Ok(Some(Reply::text(text)))
        } else {
            Ok(Some(Reply::with_files(text, files)))
        }
    }
}

/// Bot name, version and authors. `data.name` overrides the bot name.
pub struct HelpText;

#[async_trait]
impl Callback for HelpText {
    async fn call(
        &self,
        invocation: &Invocation<'_>,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<Option<Reply>> {
        let info = &invocation.services.info;
        let name = ctx
            .data
            .get("name")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| info.name.clone());

        let mut text = format!("{} v{} written by {}", name, info.version, info.authors);
        if let Some(list) = invocation.manager.get_command("commands") {
            text.push_str(&format!(
                "\nType {}{} for a list of all commands",
                invocation.prefix,
                list.name()
            ));
        }
        Ok(Some(Reply::text(text)))
    }
}

/// Lists every command name known to the invoking manager.
pub struct ListCommands;

#[async_trait]
impl Callback for ListCommands {
    async fn call(
        &self,
        invocation: &Invocation<'_>,
        _ctx: &ExecutionContext,
    ) -> anyhow::Result<Option<Reply>> {
        let names = invocation.manager.command_names();
        Ok(Some(Reply::text(format!(
            "Available commands:\n{}",
            names.join(", ")
        ))))
    }
}
