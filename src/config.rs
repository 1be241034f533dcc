use std::time::Duration;

pub const DEFAULT_DUPLICATE_CODE: &str = "ZFSS_GR/003";
pub const DEFAULT_FEEDBACK_TIMEOUT: Duration = Duration::from_millis(700);
pub const DEFAULT_SOURCE_OBJ: &str = "GR";
pub const DEFAULT_MAX_RATING: u8 = 5;

/// Tunables of the submission workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Backend message code that marks a possible duplicate posting.
    pub duplicate_code: String,
    /// Upper bound on how long a feedback post may hold up navigation.
    pub feedback_timeout: Duration,
    pub source_obj: String,
    pub max_rating: u8,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            duplicate_code: DEFAULT_DUPLICATE_CODE.to_string(),
            feedback_timeout: DEFAULT_FEEDBACK_TIMEOUT,
            source_obj: DEFAULT_SOURCE_OBJ.to_string(),
            max_rating: DEFAULT_MAX_RATING,
        }
    }
}

impl WorkflowConfig {
    pub fn set_duplicate_code(mut self, code: impl Into<String>) -> Self {
        self.duplicate_code = code.into();
        self
    }
    pub fn set_feedback_timeout(mut self, timeout: Duration) -> Self {
        self.feedback_timeout = timeout;
        self
    }
    pub fn set_source_obj(mut self, source_obj: impl Into<String>) -> Self {
        self.source_obj = source_obj.into();
        self
    }
    pub fn set_max_rating(mut self, max_rating: u8) -> Self {
        self.max_rating = max_rating;
        self
    }
}
