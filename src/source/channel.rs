use super::FrameSource;
use crate::error::SourceError;
use crate::frame::FrameData;
use tokio::sync::mpsc;

/// Frame source fed from another task, e.g. a capture callback or a decoder thread.
///
/// The stream ends once every sender is dropped and queued frames are drained.
pub struct ChannelFrameSource {
    receiver: mpsc::Receiver<FrameData>,
    name: String,
}

impl ChannelFrameSource {
    pub fn new(capacity: usize, name: &str) -> (mpsc::Sender<FrameData>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            sender,
            Self {
                receiver,
                name: name.to_string(),
            },
        )
    }
}

#[async_trait::async_trait]
impl FrameSource for ChannelFrameSource {
    async fn next_frame(&mut self) -> Result<Option<FrameData>, SourceError> {
        Ok(self.receiver.recv().await)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    #[tokio::test]
    async fn test_drains_then_ends() {
        let (sender, mut source) = ChannelFrameSource::new(4, "test");
        sender.send(FrameData::empty(0, SystemTime::now(), 8, 8)).await.unwrap();
        sender.send(FrameData::empty(1, SystemTime::now(), 8, 8)).await.unwrap();
        drop(sender);

        assert_eq!(source.next_frame().await.unwrap().unwrap().id, 0);
        assert_eq!(source.next_frame().await.unwrap().unwrap().id, 1);
        assert!(source.next_frame().await.unwrap().is_none());
    }
}
