//! Static binding of command kinds to transmitter operations.
//!
//! Each entry unpacks the envelope's positional arguments and calls one
//! [`Transmitter`] method. Argument problems surface as [`HandlerError`]s
//! before anything is sent.

use camino::Utf8PathBuf;
use serde_json::Value;

use super::command::{Args, CommandKind};
use super::errors::HandlerError;
use crate::device::Transmitter;

/// A registered operation.
pub(crate) type Handler = fn(&mut Transmitter, Args<'_>) -> Result<Value, HandlerError>;

type Outcome = Result<Value, HandlerError>;

const DEFAULT_MCU_LOG_ENTRIES: u64 = 100;

/// Returns the operation registered for `kind`.
pub(crate) fn handler_for(kind: CommandKind) -> Handler {
    use CommandKind as K;
    match kind {
        K::Connect => connect,
        K::SearchForTx => |tx, _| tx.search_for_tx(),
        K::Quit => |tx, _| tx.quit(),
        K::GetSystemInfo => |tx, _| tx.system_info(),
        K::SendSysCmd => send_sys_cmd,
        K::SendDiscovery => |tx, args| tx.send_discovery(&args.text(0, "channel")?),
        K::RxList => |tx, _| tx.rx_list(),
        K::RxDetail => |tx, args| tx.rx_detail(&receiver(args)?),
        K::LpmList => |tx, _| tx.lpm_list(),
        K::LpmDetail => |tx, args| tx.lpm_detail(&receiver(args)?),
        K::RegisterRx => |tx, args| tx.register_rx(&receiver(args)?),
        K::RemoveRx => |tx, args| tx.remove_rx(&receiver(args)?),
        K::RxLeave => |tx, args| tx.rx_leave(&receiver(args)?),
        K::RxSleep => |tx, args| tx.rx_sleep(&receiver(args)?),
        K::StartCharging => |tx, args| tx.start_charging(&receiver(args)?),
        K::StopCharging => |tx, args| tx.stop_charging(&receiver(args)?),
        K::IdentifyRx => |tx, args| tx.identify_rx(&receiver(args)?),
        K::RxConfig => rx_config,
        K::AppCommand => app_command,
        K::AppCommandData => app_command_data,
        K::SetCommChannel => |tx, args| tx.set_comm_channel(&args.text(0, "channel")?),
        K::SetValidAmbs => |tx, args| tx.set_valid_ambs(&args.text(0, "mask")?),
        K::SetPowerLevel => |tx, args| tx.set_power_level(&args.text(0, "power level")?),
        K::LpmAssign => lpm_assign,
        K::LpmFree => |tx, args| tx.lpm_free(&args.text(0, "slot")?),
        K::RxLpm => |tx, args| tx.rx_lpm(&receiver(args)?),
        K::RxLpmStandby => |tx, args| tx.rx_lpm_standby(&receiver(args)?),
        K::LpmSlots => |tx, args| tx.lpm_slots(&args.unsigned(0, "slots")?.to_string()),
        K::Lpm => |tx, args| tx.lpm(args.optional_text(0).as_deref()),
        K::RxScreenUpdate => rx_screen_update,
        K::GetTxId => |tx, _| tx.tx_id(),
        K::GetAmbInfo => |tx, _| tx.amb_info(),
        K::ChargeVirtual => |tx, _| tx.charge_virtual(),
        K::ResetHost => |tx, _| tx.reset_host(),
        K::GetMcuLog => mcu_log,
        K::GetAllConfig => |tx, _| tx.all_config(),
        K::SaveAllConfig => |tx, _| tx.save_all_config(),
        K::GetCfgParam => |tx, args| tx.cfg_param(&args.text(0, "param")?),
        K::SetCfgParam => set_cfg_param,
        K::UpdateConfigValue => update_config_value,
        K::ConnectLog => connect_log,
        K::ListLogFiles => |tx, _| tx.list_logs(),
        K::DownloadLog => download_log,
        K::DeleteLog => |tx, args| tx.delete_log(&args.text(0, "remote file")?),
        K::StartLog => start_log,
        K::StopLog => |tx, _| tx.stop_log(),
    }
}

fn receiver(args: Args<'_>) -> Result<String, HandlerError> {
    args.text(0, "receiver id")
}

fn connect(tx: &mut Transmitter, args: Args<'_>) -> Outcome {
    let host = args.text(0, "host")?;
    let port = args
        .optional_unsigned(1, "port")?
        .map(|port| {
            u16::try_from(port).map_err(|_| HandlerError::invalid_argument("port", port.to_string()))
        })
        .transpose()?;
    tx.connect(&host, port)
}

fn send_sys_cmd(tx: &mut Transmitter, args: Args<'_>) -> Outcome {
    let name = args.text(0, "command name")?;
    tx.system_command(&name, args.optional_text(1).as_deref())
}

fn rx_config(tx: &mut Transmitter, args: Args<'_>) -> Outcome {
    let id = receiver(args)?;
    let query_type = args.unsigned(1, "query type")?;
    tx.rx_config(&id, &query_type.to_string())
}

fn app_command(tx: &mut Transmitter, args: Args<'_>) -> Outcome {
    let id = receiver(args)?;
    let name = args.text(1, "command name")?;
    tx.app_command(&id, &name, args.optional_text(2).as_deref())
}

fn app_command_data(tx: &mut Transmitter, args: Args<'_>) -> Outcome {
    let id = receiver(args)?;
    let name = args.text(1, "command name")?;
    tx.app_command_data(&id, &name)
}

fn lpm_assign(tx: &mut Transmitter, args: Args<'_>) -> Outcome {
    let id = receiver(args)?;
    tx.lpm_assign(&id, args.optional_text(1).as_deref())
}

fn rx_screen_update(tx: &mut Transmitter, args: Args<'_>) -> Outcome {
    let id = receiver(args)?;
    let period = args.unsigned(1, "update period")?;
    tx.rx_screen_update(&id, period)
}

fn mcu_log(tx: &mut Transmitter, args: Args<'_>) -> Outcome {
    let entries = args
        .optional_unsigned(0, "entries")?
        .unwrap_or(DEFAULT_MCU_LOG_ENTRIES);
    tx.mcu_log(entries)
}

fn set_cfg_param(tx: &mut Transmitter, args: Args<'_>) -> Outcome {
    let param = args.text(0, "param")?;
    let value = args.text(1, "value")?;
    tx.set_cfg_param(&param, &value)
}

fn update_config_value(tx: &mut Transmitter, args: Args<'_>) -> Outcome {
    let name = args.text(0, "name")?;
    let value = args.text(1, "value")?;
    tx.update_config_value(&name, &value)
}

fn connect_log(tx: &mut Transmitter, args: Args<'_>) -> Outcome {
    let username = args.text(0, "username")?;
    let password = args.text(1, "password")?;
    tx.connect_log(&username, &password)
}

fn download_log(tx: &mut Transmitter, args: Args<'_>) -> Outcome {
    let local = Utf8PathBuf::from(args.text(0, "local path")?);
    let remote = args.text(1, "remote file")?;
    tx.download_log(&local, &remote)
}

fn start_log(tx: &mut Transmitter, args: Args<'_>) -> Outcome {
    let receivers = args
        .value(0)
        .ok_or_else(|| HandlerError::missing_argument("receivers"))?;
    let hours = args.unsigned(1, "hours")?;
    let interval = args.unsigned(2, "interval")?;
    tx.start_log(receivers, hours, interval)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::auto_assign::LiveState;
    use crate::device::Collaborators;
    use crate::dispatch::CommandTarget;
    use crate::tests::support::{FakeDevice, RecordingHealthReporter};

    #[fixture]
    fn transmitter() -> Transmitter {
        Transmitter::new(
            &cota_config::Config::default(),
            LiveState::new(),
            Arc::new(RecordingHealthReporter::default()),
            Collaborators::default(),
        )
    }

    #[rstest]
    #[case(CommandKind::RxDetail, vec![], "missing argument: receiver id")]
    #[case(CommandKind::RxConfig, vec![json!("0x01")], "missing argument: query type")]
    #[case(CommandKind::RxConfig, vec![json!("0x01"), json!("fast")], "invalid argument query type: fast")]
    #[case(CommandKind::Connect, vec![json!("127.0.0.1"), json!(70_000)], "invalid argument port: 70000")]
    #[case(CommandKind::StartLog, vec![json!(null), json!(1), json!(1)], "missing argument: receivers")]
    #[case(CommandKind::SetCfgParam, vec![json!("P")], "missing argument: value")]
    fn arguments_are_checked_before_use(
        mut transmitter: Transmitter,
        #[case] kind: CommandKind,
        #[case] values: Vec<Value>,
        #[case] expected: &str,
    ) {
        let error = handler_for(kind)(&mut transmitter, Args::new(&values))
            .expect_err("argument error");
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    fn connect_reports_refusal_as_false(mut transmitter: Transmitter) {
        let port = FakeDevice::unused_port();
        let values = [json!("127.0.0.1"), json!(port)];
        let outcome = transmitter
            .execute(CommandKind::Connect, Args::new(&values))
            .expect("connect handled");
        assert_eq!(outcome, json!(false));
        assert!(!transmitter.is_connected());
    }

    #[rstest]
    fn registered_operations_reach_the_device(mut transmitter: Transmitter) {
        let device = FakeDevice::orion();
        let values = [json!("127.0.0.1"), json!(device.port())];
        transmitter
            .execute(CommandKind::Connect, Args::new(&values))
            .expect("connect");

        let values = [json!("0x1234"), json!(7)];
        let status = transmitter
            .execute(CommandKind::RxConfig, Args::new(&values))
            .expect("rx_config");
        assert_eq!(status, json!("SUCCESS"));

        let requests = device.requests();
        let request = requests.last().expect("request");
        assert_eq!(request["Command"]["Type"], json!("rx_config"));
        assert_eq!(request["Command"]["Query Type"], json!(7));
    }

    #[rstest]
    fn quit_succeeds_while_disconnected(mut transmitter: Transmitter) {
        let outcome = handler_for(CommandKind::Quit)(&mut transmitter, Args::new(&[]));
        assert_eq!(outcome.expect("quit"), json!("SUCCESS"));
    }
}
