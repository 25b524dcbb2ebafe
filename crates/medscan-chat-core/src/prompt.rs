/// Blocking user interaction: confirmation dialogs and notices.
pub trait UserPrompt: Send + Sync {
    fn confirm(&self, question: &str) -> bool;
    fn notify(&self, message: &str);
}
