use emberlink_tree::{ParameterType, Value};

use crate::cmd::{connect, parse_timeout, InvokeArgs};
use crate::exit::{consumer_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_invocation, OutputFormat};

pub async fn run(args: InvokeArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_timeout(&args.connect.timeout)?;
    let consumer = connect(&args.connect).await?;

    let path = args.path.clone();
    let signature = consumer
        .with_tree(move |tree| {
            let function = tree.get(tree.find(&path)?)?.as_function()?;
            Some(
                function
                    .arguments
                    .iter()
                    .map(|item| item.kind)
                    .collect::<Vec<_>>(),
            )
        })
        .await
        .map_err(|err| consumer_error("tree read failed", err))?
        .ok_or_else(|| CliError::new(USAGE, format!("not a function: {}", args.path)))?;
    let arguments = parse_arguments(&signature, &args.arguments)?;

    let result = tokio::time::timeout(timeout, consumer.invoke(&args.path, arguments))
        .await
        .map_err(|_| CliError::new(TIMEOUT, format!("no result after {timeout:?}")))?
        .map_err(|err| consumer_error("invocation failed", err))?;
    consumer.close().await;

    print_invocation(&result, format);
    Ok(SUCCESS)
}

/// Parse arguments by the declared signature, or by their look when none is declared.
fn parse_arguments(signature: &[ParameterType], texts: &[String]) -> CliResult<Vec<Value>> {
    if signature.is_empty() {
        return Ok(texts.iter().map(|text| infer_value(text)).collect());
    }
    if signature.len() != texts.len() {
        return Err(CliError::new(
            USAGE,
            format!(
                "expected {} argument(s), got {}",
                signature.len(),
                texts.len()
            ),
        ));
    }
    signature
        .iter()
        .zip(texts)
        .map(|(kind, text)| Value::parse(*kind, text).map_err(|err| CliError::new(USAGE, err)))
        .collect()
}

fn infer_value(text: &str) -> Value {
    if let Ok(value) = text.parse::<i64>() {
        Value::Integer(value)
    } else if let Ok(value) = text.parse::<f64>() {
        Value::Real(value)
    } else if let Ok(value) = text.parse::<bool>() {
        Value::Boolean(value)
    } else {
        Value::String(text.to_string())
    }
}
