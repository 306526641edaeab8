use serde::{Deserialize, Serialize};

pub const UPLOAD: &str = "upload";
pub const EXTRACT: &str = "extract";
pub const PROCESS: &str = "process";
pub const ADVANCED_AI: &str = "advanced-ai";
pub const FORMAT_CONVERSION: &str = "format-conversion";
pub const COPY_EDITING: &str = "copy-editing";
pub const PREP_PUBLISH: &str = "prep-publish";
pub const PUBLISH_NEWS: &str = "publish-news";

/// Source of the document a run ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    File,
    Url,
}

impl PipelineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineKind::File => "file",
            PipelineKind::Url => "url",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

impl StageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStage {
    pub id: String,
    pub name: String,
    pub status: StageStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub weight: f64,
}

impl ProcessStage {
    pub fn is_active(&self) -> bool {
        self.status == StageStatus::Processing
    }
}

/// Static description of one stage in a layout.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDefinition {
    pub id: String,
    pub name: String,
    pub group: Option<String>,
    pub weight: f64,
}

impl StageDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            group: None,
            weight: 1.0,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn weighted(mut self, weight: f64) -> Self {
        self.weight = weight.max(0.0);
        self
    }

    pub(crate) fn instantiate(&self) -> ProcessStage {
        ProcessStage {
            id: self.id.clone(),
            name: self.name.clone(),
            status: StageStatus::Pending,
            progress: 0,
            message: None,
            result_key: None,
            group: self.group.clone(),
            weight: self.weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageGroup {
    pub id: String,
    pub title: String,
}

/// Fixed stage order for one pipeline kind.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineLayout {
    pub stages: Vec<StageDefinition>,
    pub groups: Vec<StageGroup>,
}

impl PipelineLayout {
    pub fn new(stages: Vec<StageDefinition>) -> Self {
        Self {
            stages,
            groups: Vec::new(),
        }
    }

    pub fn with_groups(mut self, groups: Vec<StageGroup>) -> Self {
        self.groups = groups;
        self
    }

    /// Gives every group the same share of the overall progress, split evenly
    /// among its stages. Stages outside any known group keep their weight.
    pub fn with_group_weights(mut self) -> Self {
        let group_count = self.groups.len();
        if group_count == 0 {
            return self;
        }
        for group in &self.groups {
            let members = self
                .stages
                .iter()
                .filter(|s| s.group.as_deref() == Some(group.id.as_str()))
                .count();
            if members == 0 {
                continue;
            }
            let share = 1.0 / (group_count as f64 * members as f64);
            for stage in self
                .stages
                .iter_mut()
                .filter(|s| s.group.as_deref() == Some(group.id.as_str()))
            {
                stage.weight = share;
            }
        }
        self
    }

    pub fn for_kind(kind: PipelineKind) -> Self {
        let intake_name = match kind {
            PipelineKind::File => "Upload file",
            PipelineKind::Url => "Resolve URL",
        };
        Self::new(vec![
            StageDefinition::new(UPLOAD, intake_name).in_group("initial"),
            StageDefinition::new(EXTRACT, "Extract content").in_group("initial"),
            StageDefinition::new(PROCESS, "AI content pass").in_group("initial"),
            StageDefinition::new(ADVANCED_AI, "PR writer pass").in_group("advanced"),
            StageDefinition::new(FORMAT_CONVERSION, "Format conversion").in_group("advanced"),
            StageDefinition::new(COPY_EDITING, "AI copy editing").in_group("advanced"),
            StageDefinition::new(PREP_PUBLISH, "Prepare publication").in_group("final"),
            StageDefinition::new(PUBLISH_NEWS, "Publish").in_group("final"),
        ])
        .with_groups(vec![
            StageGroup {
                id: "initial".to_string(),
                title: "Initial processing".to_string(),
            },
            StageGroup {
                id: "advanced".to_string(),
                title: "Post-processing".to_string(),
            },
            StageGroup {
                id: "final".to_string(),
                title: "Publishing".to_string(),
            },
        ])
    }

    pub fn position(&self, stage_id: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.id == stage_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layouts_share_order() {
        let file = PipelineLayout::for_kind(PipelineKind::File);
        let url = PipelineLayout::for_kind(PipelineKind::Url);
        let ids = |l: &PipelineLayout| l.stages.iter().map(|s| s.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&file), ids(&url));
        assert_eq!(file.stages[0].name, "Upload file");
        assert_eq!(url.stages[0].name, "Resolve URL");
        assert_eq!(file.position(PUBLISH_NEWS), Some(7));
    }

    #[test]
    fn group_weights_split_each_group_evenly() {
        let layout = PipelineLayout::for_kind(PipelineKind::File).with_group_weights();
        let total: f64 = layout.stages.iter().map(|s| s.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
        let upload = &layout.stages[0];
        let publish = &layout.stages[7];
        assert!((upload.weight - 1.0 / 9.0).abs() < 1e-9);
        assert!((publish.weight - 1.0 / 6.0).abs() < 1e-9);
    }
}
