pub mod chat_client;
pub mod config;
pub mod file_store;
pub mod observability;
pub mod process_registry;
pub mod shell_executor;
pub mod terminal;

pub use chat_client::SseChatClient;
pub use config::Config;
pub use file_store::LocalFileSystem;
pub use process_registry::ProcessRegistry;
pub use shell_executor::LocalShellExecutor;
pub use terminal::ConsoleTerminal;
