mod sqs;

pub use sqs::{SqsMessageQueue, SqsQueueSettings};
