use futures::{Stream, StreamExt};

use crate::controller::{CommandSink, Controller};
use transport::DebugMessage;

/// Feed every decoded document to the controller until the engine goes away.
///
/// A document that fails to decode ends the session with that error.
pub async fn drive<St, E, S>(documents: St, controller: &mut Controller<S>) -> eyre::Result<()>
where
    St: Stream<Item = Result<Vec<DebugMessage>, E>>,
    E: Into<eyre::Report>,
    S: CommandSink,
{
    let mut documents = std::pin::pin!(documents);
    while let Some(document) = documents.next().await {
        let messages = document.map_err(Into::<eyre::Report>::into)?;
        tracing::trace!(count = messages.len(), "document received");
        for message in messages {
            controller.handle(message)?;
        }
    }
    tracing::info!("engine disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControllerConfig, Policy};
    use transport::{Command, Login};

    #[tokio::test]
    async fn drives_messages_in_order() {
        let documents = futures::stream::iter(vec![
            Ok::<_, eyre::Report>(vec![DebugMessage::Login(Login {
                name: "n".into(),
                value: "1".into(),
            })]),
            Ok(vec![
                DebugMessage::Log("a".into()),
                DebugMessage::Unknown { tag: "x".into() },
            ]),
        ]);
        let mut controller = Controller::new(Vec::<Command>::new(), ControllerConfig::default());
        let events = controller.events();

        drive(documents, &mut controller).await.unwrap();

        assert_eq!(events.try_iter().count(), 3);
        assert_eq!(controller.sink().len(), 2);
    }

    #[tokio::test]
    async fn decode_error_ends_session() {
        let documents = futures::stream::iter(vec![
            Err(eyre::eyre!("not an xsbug document")),
            Ok(vec![DebugMessage::Log("never".into())]),
        ]);
        let mut controller = Controller::new(
            Vec::<Command>::new(),
            ControllerConfig {
                policy: Policy::Hold,
                ..ControllerConfig::default()
            },
        );
        let events = controller.events();

        assert!(drive(documents, &mut controller).await.is_err());
        assert_eq!(events.try_iter().count(), 0);
    }
}
