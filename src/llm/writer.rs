//! Modification notes for bug reports

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::providers::{ChatMessage, LlmClient};
use crate::hg::{FileChange, FileStatus};

const SYSTEM_PROMPT: &str = "你是一个代码审查助手，帮助工程师根据代码变更生成修改说明。请根据提供的代码变更信息，生成清晰、简洁的修改描述，用中文回复。

要求：
- 只输出修改说明，不要添加其他内容
- 说明修改了哪些文件，做了什么变更
- 保持简洁，突出重点";

/// A changed file as sent by the browser extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub status: FileStatus,
}

impl From<&FileChange> for ChangedFile {
    fn from(change: &FileChange) -> Self {
        Self {
            path: change.path.clone(),
            status: change.status,
        }
    }
}

/// Prompt label; renames get their own word here
fn prompt_label(status: &FileStatus) -> String {
    match status {
        FileStatus::Other('R') => "重命名".to_string(),
        FileStatus::Other(c) => c.to_string(),
        known => known.label(),
    }
}

pub fn build_user_prompt(files: &[ChangedFile], description: &str) -> String {
    let description = if description.trim().is_empty() {
        "无"
    } else {
        description.trim()
    };

    let file_list = if files.is_empty() {
        "无".to_string()
    } else {
        files
            .iter()
            .map(|f| format!("[{}] {}", prompt_label(&f.status), f.path))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "请根据以下代码变更信息，生成修改说明：

**问题描述**:
{}

**变更的文件**:
{}

请简要说明这些修改的内容和目的。",
        description, file_list
    )
}

/// Turns a change list plus issue description into a modification note
pub struct ModificationWriter {
    client: LlmClient,
}

impl ModificationWriter {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    pub async fn generate(&self, files: &[ChangedFile], description: &str) -> Result<String> {
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_user_prompt(files, description)),
        ];
        let note = self.client.complete(&messages).await?;
        Ok(note.trim().to_string())
    }
}
