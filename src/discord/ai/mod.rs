// Discord AI module
//
// Mention-triggered chat: gather recent channel history, run it through the
// provider fallback chain and post the answer.

pub mod mention_handler;

pub use mention_handler::handle_mention;
