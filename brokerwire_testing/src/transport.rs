//! In-memory transport recording every outbound command.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use brokerwire::{
    command::{AckKind, MessageAck, Redeliver, TransactionInfo, TransactionKind, WireCommand},
    message::Message,
    transport::{Transport, TransportError},
};

type FailurePredicate = Box<dyn Fn(&WireCommand) -> bool + Send + Sync>;

/// [`Transport`] that stores the commands it accepts and can be told to
/// reject some of them.
///
/// Rejected commands are not recorded.
#[derive(Default)]
pub struct RecordingTransport {
    commands: Mutex<Vec<WireCommand>>,
    fail_when: Mutex<Option<FailurePredicate>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// Reject every command for which `predicate` returns `true`.
    pub fn fail_when(&self, predicate: impl Fn(&WireCommand) -> bool + Send + Sync + 'static) {
        *lock(&self.fail_when) = Some(Box::new(predicate));
    }

    /// Reject every command.
    pub fn fail_all(&self) { self.fail_when(|_| true); }

    /// Accept commands again.
    pub fn heal(&self) { *lock(&self.fail_when) = None; }

    /// Snapshot of every accepted command, oldest first.
    #[must_use]
    pub fn commands(&self) -> Vec<WireCommand> { lock(&self.commands).clone() }

    /// Drain the recorded commands.
    pub fn take(&self) -> Vec<WireCommand> { std::mem::take(&mut *lock(&self.commands)) }

    pub fn clear(&self) { lock(&self.commands).clear(); }

    /// Accepted acknowledgements.
    #[must_use]
    pub fn acks(&self) -> Vec<MessageAck> {
        self.filter(|command| match command {
            WireCommand::MessageAck(ack) => Some(ack.clone()),
            _ => None,
        })
    }

    /// Accepted acknowledgements of one kind.
    #[must_use]
    pub fn acks_of(&self, kind: AckKind) -> Vec<MessageAck> {
        self.acks()
            .into_iter()
            .filter(|ack| ack.kind == kind)
            .collect()
    }

    /// Messages handed back for redelivery elsewhere.
    #[must_use]
    pub fn redelivers(&self) -> Vec<Redeliver> {
        self.filter(|command| match command {
            WireCommand::Redeliver(redeliver) => Some(*redeliver),
            _ => None,
        })
    }

    /// Phases of every transaction sent, in order.
    #[must_use]
    pub fn transaction_kinds(&self) -> Vec<TransactionKind> {
        self.transactions().into_iter().map(|tx| tx.kind).collect()
    }

    #[must_use]
    pub fn transactions(&self) -> Vec<TransactionInfo> {
        self.filter(|command| match command {
            WireCommand::Transaction(info) => Some(*info),
            _ => None,
        })
    }

    /// Messages sent by producers.
    #[must_use]
    pub fn sent_messages(&self) -> Vec<Message> {
        self.filter(|command| match command {
            WireCommand::Message(message) => Some(message.clone()),
            _ => None,
        })
    }

    fn filter<T>(&self, f: impl FnMut(&WireCommand) -> Option<T>) -> Vec<T> {
        lock(&self.commands).iter().filter_map(f).collect()
    }
}

impl Transport for RecordingTransport {
    fn send_command(&self, command: WireCommand) -> Result<(), TransportError> {
        if lock(&self.fail_when)
            .as_ref()
            .is_some_and(|predicate| predicate(&command))
        {
            return Err(TransportError::Failed(format!(
                "rejected {} command",
                command.kind()
            )));
        }
        lock(&self.commands).push(command);
        Ok(())
    }
}
