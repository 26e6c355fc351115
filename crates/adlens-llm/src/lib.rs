pub mod extract;
pub mod mock;
pub mod ollama;
pub mod planner;
pub mod prompts;
pub mod synthesizer;

pub use mock::{MockChatModel, MockReply};
pub use ollama::OllamaProvider;
pub use planner::LlmPlanner;
pub use synthesizer::LlmSynthesizer;
