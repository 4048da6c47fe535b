//! Typed communication protocol for the sync layer.

pub mod communication;
pub mod utils;

pub use communication::{AppEvent, ChangeEvent, ChangeOp, Command, TableName, TableRow};
pub use utils::{
    create_app_event_channel, create_change_event_channel, create_command_channel,
    AppEventReceiver, AppEventSender, ChangeEventReceiver, ChangeEventSender, ChannelError,
    CommandReceiver, CommandSender, NonBlockingSend,
};
