use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("emberlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: emberlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("EMBERLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: consumer={}, async={}, cli=true",
        cfg!(feature = "consumer"),
        cfg!(feature = "async")
    );
    println!(
        "protocol: S101 v{}, Glow DTD {}.{}",
        emberlink_s101::codec::VERSION,
        emberlink_s101::codec::GLOW_APP_BYTES[1],
        emberlink_s101::codec::GLOW_APP_BYTES[0]
    );

    Ok(SUCCESS)
}
