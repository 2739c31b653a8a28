use crossterm::style::Color;
use serde::{Deserialize, Serialize};

use crate::ui::theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
}

impl TestStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            TestStatus::Passed => "✔",
            TestStatus::Failed => "✖",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            TestStatus::Passed => theme::GREEN,
            TestStatus::Failed => theme::RED,
        }
    }
}
