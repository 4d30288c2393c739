mod common;

mod reminders;
mod scheduling;
