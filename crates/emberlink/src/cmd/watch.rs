use emberlink_tree::{Change, Tree};
use tokio::sync::{mpsc, watch};

use crate::cmd::{connect, WatchArgs};
use crate::exit::{consumer_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_change, ChangeOutput, OutputFormat};

pub async fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let consumer = connect(&args.connect).await?;

    let (stop_tx, mut stop) = watch::channel(false);
    install_ctrlc_handler(stop_tx)?;

    let (changes_tx, mut changes) = mpsc::unbounded_channel();
    consumer
        .subscribe(move |tree: &Tree, batch: &[Change]| {
            for change in batch {
                let _ = changes_tx.send(ChangeOutput::new(tree, *change));
            }
        })
        .await
        .map_err(|err| consumer_error("subscribe failed", err))?;

    let mut printed = 0usize;
    loop {
        tokio::select! {
            change = changes.recv() => {
                let Some(change) = change else {
                    // The connection task dropped the subscriber.
                    return match consumer.await_ready().await {
                        Ok(()) => Ok(SUCCESS),
                        Err(err) => Err(consumer_error("watch ended", err)),
                    };
                };
                print_change(&change, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            _ = stop.changed() => break,
        }
    }

    consumer.close().await;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(stop: watch::Sender<bool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        let _ = stop.send(true);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
