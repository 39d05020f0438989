use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("nvrpc {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    println!(
        "target: {}",
        option_env!("NVRPC_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("os: {} ({})", std::env::consts::OS, std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: json={}, async={}, cli=true",
        cfg!(feature = "json"),
        cfg!(feature = "async")
    );
    println!(
        "transport: read chunk {} bytes",
        nvrpc_transport::READ_CHUNK_SIZE
    );

    Ok(SUCCESS)
}
