mod botfleet;

pub use botfleet::BotfleetError;
