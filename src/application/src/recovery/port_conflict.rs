use super::RecoveryOutcome;
use crate::handlers::StepContext;
use domain::services::KILL_PORT_COMMAND;
use once_cell::sync::Lazy;
use regex::Regex;

static ADDRESS_IN_USE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)EADDRINUSE|address already in use|port \d+ is (?:already )?in use|already running on port|포트.*사용\s*중",
    )
    .expect("address in use pattern is valid")
});

static SERVER_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:dev|start|serve|preview|runserver)\b|\bgo\s+run\b|\bcargo\s+run\b|bootRun|spring-boot:run|\buvicorn\b|\bflask\s+run\b",
    )
    .expect("server start pattern is valid")
});

static PORT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"(?i)\bport\s*[:=]?\s*(\d{4,5})\b", r":(\d{4,5})\b", r"\b(\d{4,5})\b"]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("port pattern is valid"))
        .collect()
});

/// A server start that failed because its address was taken.
pub fn is_port_conflict(command: &str, failure: &str) -> bool {
    SERVER_START.is_match(command) && ADDRESS_IN_USE.is_match(failure)
}

/// Port from the failure text: `port N`, then `:N`, then any 4-5 digit run.
/// Lines reporting the address in use are searched before the whole text,
/// so timestamps and stack frames elsewhere are not mistaken for the port.
pub fn extract_port(failure: &str) -> Option<u16> {
    failure
        .lines()
        .filter(|line| ADDRESS_IN_USE.is_match(line))
        .find_map(port_in)
        .or_else(|| port_in(failure))
}

fn port_in(text: &str) -> Option<u16> {
    PORT_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| m.as_str().parse::<u16>().ok())
            .find(|port| *port != 0)
    })
}

/// Free the port once, wait, then retry the command once. The kill outcome
/// is only logged; the retry decides.
pub async fn recover(ctx: &StepContext<'_>, command: &str, port: u16) -> RecoveryOutcome {
    ctx.log.warning(format!("Port {} is already in use, freeing it", port));

    let kill = format!("{} {}", KILL_PORT_COMMAND, port);
    let killed = ctx.run_shell(&kill).await;
    if killed.success {
        ctx.log.info(format!("Freed port {}", port));
    } else {
        ctx.log.warning(format!(
            "Could not free port {}: {}",
            port,
            killed.failure_text()
        ));
    }

    tokio::time::sleep(ctx.config.port_release_delay()).await;

    ctx.log.info(format!("Retrying {}", command));
    let retry = ctx.run_shell(command).await;
    if retry.success {
        ctx.log.success(format!("{} recovered after freeing port {}", command, port));
        RecoveryOutcome::Recovered
    } else {
        ctx.log.command_error(
            command,
            format!("{} still fails after freeing port {}", command, port),
            &retry.failure_text(),
        );
        RecoveryOutcome::StillFailing
    }
}
