/// Engine-wide defaults and limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Hard bound on scheduling passes per run.
    pub max_passes: usize,
    /// Model used by image generators that do not name one.
    pub default_image_model: String,
    /// Model used by video generators that do not name one.
    pub default_video_model: String,
    /// Model used by prompt agents that do not name one.
    pub default_prompt_model: String,
    pub default_video_duration_secs: u32,
    /// Upper bound on "Style:" scenarios per video node.
    pub max_scenarios: usize,
    /// Upper bound on images per image generator.
    pub max_image_count: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_passes: 100,
            default_image_model: "gemini-3-pro-image-preview".to_string(),
            default_video_model: "veo-3.0-generate-preview".to_string(),
            default_prompt_model: "gemini-2.0-flash".to_string(),
            default_video_duration_secs: 5,
            max_scenarios: 6,
            max_image_count: 8,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes;
        self
    }

    pub fn default_image_model(mut self, model: impl Into<String>) -> Self {
        self.default_image_model = model.into();
        self
    }

    pub fn default_video_model(mut self, model: impl Into<String>) -> Self {
        self.default_video_model = model.into();
        self
    }

    pub fn default_prompt_model(mut self, model: impl Into<String>) -> Self {
        self.default_prompt_model = model.into();
        self
    }

    pub fn default_video_duration_secs(mut self, seconds: u32) -> Self {
        self.default_video_duration_secs = seconds;
        self
    }

    pub fn max_scenarios(mut self, scenarios: usize) -> Self {
        self.max_scenarios = scenarios;
        self
    }

    pub fn max_image_count(mut self, count: u32) -> Self {
        self.max_image_count = count;
        self
    }
}
