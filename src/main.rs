mod cli;

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands, SubArgs};
use testbed_scheduler::domain::clock::clock::{Clock, SystemClock};
use testbed_scheduler::domain::identity::{EnvUserIdentity, UserIdentity};
use testbed_scheduler::domain::reservation::reservation::Reservation;
use testbed_scheduler::domain::scheduler::request::{BootRequest, CreateRequest, NodeSpec};
use testbed_scheduler::domain::scheduler::scheduler::Scheduler;
use testbed_scheduler::domain::utils::id::{ReservationName, UserName};
use testbed_scheduler::loader::parser::{format_start_time, parse_duration, parse_start_time};
use testbed_scheduler::{logger, open_scheduler};

fn main() -> anyhow::Result<()> {
    logger::init();
    let cli = Cli::parse();

    let clock: Arc<dyn SystemClock> = Arc::new(Clock::new());
    let scheduler = open_scheduler(&cli.config, clock.clone()).with_context(|| format!("failed to open scheduler using '{}'", cli.config))?;
    let user = EnvUserIdentity.current_user()?;

    scheduler.expire().context("failed to expire old reservations")?;

    match cli.command {
        Commands::Sub(args) => submit(&scheduler, &user, args),
        Commands::Del { name } => {
            let deleted = scheduler.cancel_by_name(&ReservationName::new(name), &user)?;
            println!("Reservation {} deleted.", deleted.name.to_string().bold());
            Ok(())
        }
        Commands::Extend { name, duration } => {
            let name = ReservationName::new(name);
            let extra_minutes = parse_duration(&duration)?;

            let Some(reservation) = scheduler.get_by_name(&name)? else {
                bail!("reservation '{}' does not exist", name);
            };

            let extended = scheduler.extend(reservation.id, extra_minutes, &user)?;
            println!("Reservation {} now ends {}.", extended.name.to_string().bold(), format_start_time(extended.end_time));
            Ok(())
        }
        Commands::Show => {
            show(&scheduler, clock.get_current_time_in_s())?;
            Ok(())
        }
    }
}

fn submit(scheduler: &Scheduler, user: &UserName, args: SubArgs) -> anyhow::Result<()> {
    let duration_minutes = parse_duration(&args.duration)?;
    let nodes = NodeSpec::from_flags(args.count, args.nodes)?;
    let earliest_start = args.after.as_deref().map(parse_start_time).transpose()?;

    if args.speculative {
        let windows = scheduler.speculate(duration_minutes, &nodes, earliest_start)?;

        println!("{:<24}{}", "START".bold(), "END".bold());
        for window in windows {
            println!("{:<24}{}", format_start_time(window.start), format_start_time(window.end));
        }
        return Ok(());
    }

    let boot = BootRequest { kernel: args.kernel, initrd: args.initrd, profile: args.profile };

    let mut request = CreateRequest::new(args.name, user.as_str(), duration_minutes, nodes, boot).with_kernel_args(args.kernel_args);
    if let Some(earliest_start) = earliest_start {
        request = request.with_earliest_start(earliest_start);
    }

    let reservation = scheduler.create(request)?;
    let hosts = scheduler.config().nodes.unsplit_range(&reservation.hosts)?;

    println!(
        "Reservation {} created for {} - {}",
        reservation.name.to_string().green().bold(),
        format_start_time(reservation.start_time),
        format_start_time(reservation.end_time)
    );
    println!("Nodes: {}", hosts);
    println!("VLAN: {}", reservation.vlan);

    Ok(())
}

fn show(scheduler: &Scheduler, now: i64) -> anyhow::Result<()> {
    let reservations = scheduler.list()?;

    if reservations.is_empty() {
        println!("No reservations.");
        return Ok(());
    }

    println!(
        "{:<20}{:<12}{:<20}{:<20}{:<8}{}",
        "NAME".bold(),
        "OWNER".bold(),
        "START".bold(),
        "END".bold(),
        "VLAN".bold(),
        "NODES".bold()
    );

    for reservation in &reservations {
        println!("{}", row(scheduler, reservation, now)?);
    }

    Ok(())
}

fn row(scheduler: &Scheduler, reservation: &Reservation, now: i64) -> anyhow::Result<String> {
    let hosts = scheduler.config().nodes.unsplit_range(&reservation.hosts)?;

    let name = format!("{:<20}", reservation.name.to_string());
    let name = if reservation.start_time <= now { name.green() } else { name.yellow() };

    Ok(format!(
        "{}{:<12}{:<20}{:<20}{:<8}{}",
        name,
        reservation.owner.to_string(),
        format_start_time(reservation.start_time),
        format_start_time(reservation.end_time),
        reservation.vlan,
        hosts
    ))
}
