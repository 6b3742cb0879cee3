use crate::cmd::{connect, TreeArgs};
use crate::exit::{consumer_error, CliResult, SUCCESS};
use crate::output::{element_rows, print_tree, OutputFormat};

pub async fn run(args: TreeArgs, format: OutputFormat) -> CliResult<i32> {
    let consumer = connect(&args.connect).await?;
    let rows = consumer
        .with_tree(element_rows)
        .await
        .map_err(|err| consumer_error("tree read failed", err))?;
    consumer.close().await;

    print_tree(&rows, format);
    Ok(SUCCESS)
}
