//! Change notification fan-out.

pub mod notifier;

pub use notifier::ChangeNotifier;
