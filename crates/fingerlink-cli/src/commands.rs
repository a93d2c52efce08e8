//! Subcommand implementations

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use fingerlink_acquire::Engine;
use fingerlink_core::{AcquireEvent, AcquireOptions};
use fingerlink_hardware::mock::MockReaderHandle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// How long a simulated finger waits for the reader to be armed.
const ARM_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for the event a finger press produces.
const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn parse_bytes(text: &str) -> Result<Vec<u8>> {
    serde_json::from_str(text).with_context(|| format!("expected a JSON byte array, got {text}"))
}

pub async fn readers(engine: &Engine) -> Result<()> {
    for (index, name) in engine.list_readers(true).await.iter().enumerate() {
        println!("{index}: {name}");
    }
    Ok(())
}

pub async fn acquire(
    engine: &Engine,
    reader: &MockReaderHandle,
    options: &str,
    select: Option<&str>,
    fingers: &[String],
) -> Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(options).context("options must be JSON")?;
    let options = AcquireOptions::from_value(&value)?;
    let fingers = fingers
        .iter()
        .map(|finger| parse_bytes(finger))
        .collect::<Result<Vec<_>>>()?;

    if let Some(name) = select {
        engine.list_readers(true).await;
        if !engine.select_reader(name).await {
            bail!("reader {name} not found");
        }
    }

    let (tx, mut events) = mpsc::unbounded_channel();
    engine.try_start_acquire(options, move |event: AcquireEvent| {
        let _ = tx.send(event);
    })?;
    info!("Acquiring with {:?}", options);

    for finger in fingers {
        wait_armed(reader).await?;
        debug!("Presenting finger {:?}", finger);
        reader.present_finger(finger);
        print_until_payload(&mut events).await?;
    }

    let (done_tx, done_rx) = oneshot::channel();
    engine.try_stop_acquire(move || {
        let _ = done_tx.send(());
    })?;
    done_rx.await.context("acquisition ended without completing stop")?;

    // Anything delivered before the stop completed
    while let Ok(event) = events.try_recv() {
        print_event(&event)?;
    }
    Ok(())
}

pub async fn compare(engine: &Engine, feature: &str, template: &str) -> Result<()> {
    let matched = engine
        .compare(parse_bytes(feature)?, parse_bytes(template)?)?
        .await?;
    println!("{matched}");
    Ok(())
}

pub async fn identify(engine: &Engine, feature: &str, templates: &[String]) -> Result<()> {
    let templates = templates
        .iter()
        .map(|template| parse_bytes(template))
        .collect::<Result<Vec<_>>>()?;
    let index = engine.identify(parse_bytes(feature)?, templates)?.await?;
    println!("{index}");
    Ok(())
}

async fn wait_armed(reader: &MockReaderHandle) -> Result<()> {
    timeout(ARM_TIMEOUT, async {
        while !reader.is_armed() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .map_err(|_| anyhow!("reader was not armed in time"))
}

/// Print events until one carrying a payload arrives.
async fn print_until_payload(events: &mut mpsc::UnboundedReceiver<AcquireEvent>) -> Result<()> {
    loop {
        let event = match timeout(EVENT_TIMEOUT, events.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => bail!("event stream closed"),
            Err(_) => {
                warn!("No capture reported for the presented finger");
                return Ok(());
            }
        };
        print_event(&event)?;
        if event.data().is_some() {
            return Ok(());
        }
    }
}

fn print_event(event: &AcquireEvent) -> Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}
