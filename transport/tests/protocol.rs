use std::io::IsTerminal;

use eyre::WrapErr;
use futures::{SinkExt, StreamExt};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing_subscriber::EnvFilter;

use transport::testing::{document, frame_document, MemoryTransport};
use transport::{
    split, Breakpoint, CodecError, Command, DebugMessage, DecodeError, DocumentReader,
    EngineCodec, XsbugTransport,
};

// test suite "constructor"
#[ctor::ctor]
fn init() {
    let in_ci = std::env::var("CI")
        .map(|val| val == "true")
        .unwrap_or(false);

    if std::io::stderr().is_terminal() || in_ci {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .json()
            .try_init();
    }

    // error traces
    let _ = color_eyre::install();
}

#[tokio::test]
async fn login_then_break_session() -> eyre::Result<()> {
    let (client, engine) = MemoryTransport::pair();
    let (mut documents, mut commands) = split(client);
    let (engine_read, engine_write) = engine.into_split();
    let mut engine_in = FramedRead::new(engine_read, EngineCodec::new());
    let mut engine_out = FramedWrite::new(engine_write, EngineCodec::new());

    engine_out
        .send(document(&[r#"<login name="runmod" value="XS"/>"#]))
        .await
        .wrap_err("sending login")?;

    let login = documents.next().await.expect("stream ended")?;
    assert!(matches!(&login[..], [DebugMessage::Login(l)] if l.name == "runmod" && l.value == "XS"));

    let set_all = Command::set_all_breakpoints([Breakpoint::new("/mod/main.js", 9)], true, false);
    commands.send(set_all.clone()).await?;
    commands.send(Command::Step).await?;

    assert_eq!(engine_in.next().await.expect("stream ended")?, set_all);
    assert_eq!(engine_in.next().await.expect("stream ended")?, Command::Step);

    engine_out
        .send(document(&[
            r#"<frames><frame name="main" value="@1" path="/mod/main.js" line="9"/></frames>"#,
            r#"<local name="main" value="@1" path="/mod/main.js" line="9"><property name="x" value="1" flags="W"/></local>"#,
            r#"<break path="/mod/main.js" line="9">step</break>"#,
        ]))
        .await?;

    let stop = documents.next().await.expect("stream ended")?;
    let tags: Vec<_> = stop.iter().map(DebugMessage::tag).collect();
    assert_eq!(tags, ["frames", "local", "break"]);
    let DebugMessage::Local(local) = &stop[1] else {
        panic!("expected local");
    };
    assert!(!local.properties[0].flags.writable);

    Ok(())
}

#[tokio::test]
async fn reader_handles_split_writes() -> eyre::Result<()> {
    let (client, engine) = MemoryTransport::pair_with_buffer_size(8);
    let (read, _write) = client.into_split();
    let (_engine_read, mut engine_write) = engine.into_split();
    let mut reader = DocumentReader::new(read);

    let bytes = frame_document(&["<log>a long enough message to span writes</log>"]);
    let writer = tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        engine_write.write_all(&bytes).await
    });

    let messages = reader.next().await.expect("stream ended")?;
    assert_eq!(
        messages,
        vec![DebugMessage::Log(
            "a long enough message to span writes".into()
        )]
    );
    writer.await??;
    Ok(())
}

#[tokio::test]
async fn bad_root_surfaces_error() -> eyre::Result<()> {
    let (client, engine) = MemoryTransport::pair();
    let (mut documents, _commands) = split(client);
    let (_engine_read, engine_write) = engine.into_split();
    let mut engine_out = FramedWrite::new(engine_write, EngineCodec::new());

    engine_out
        .send("<other><log>x</log></other>".to_owned())
        .await?;
    engine_out
        .send(document(&["<log>after</log>"]))
        .await?;

    let first = documents.next().await.expect("stream ended");
    assert!(
        matches!(
            first,
            Err(CodecError::Decode(DecodeError::NotXsbug { ref root })) if root == "other"
        ),
        "{first:?}"
    );

    let second = documents.next().await.expect("stream ended")?;
    assert_eq!(second, vec![DebugMessage::Log("after".into())]);
    Ok(())
}
