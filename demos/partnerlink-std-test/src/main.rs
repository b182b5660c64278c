use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use env_logger::Builder;
use log::LevelFilter;
use log::{Level, log};
use partnerlink_ir_lib::ir_device_simulator::{
    IrDevice, IrInputMessage, IrInputQueue, IrInputQueueSender, IrOutputMessage, IrOutputQueue, IrOutputQueueReceiver,
};
use partnerlink_ir_lib::{CarrierKind, IR_FRAME_BITS, IrLinkConfig, IrLinkManager, LinkState, PartnerEvents, RawCapture};

struct LoggingEvents(u8);

impl PartnerEvents for LoggingEvents {
    fn on_wrong_match(&mut self) {
        log!(Level::Info, "[{}] trait subsystem: wrong match recorded", self.0);
    }
}

/// The shared air between the two simulated nodes: everything one node
/// transmits is delivered to the other node's receiver.
#[embassy_executor::task]
async fn medium_task(
    a_out: IrOutputQueueReceiver,
    a_in: IrInputQueueSender,
    b_out: IrOutputQueueReceiver,
    b_in: IrInputQueueSender,
) -> ! {
    loop {
        while let Ok(IrOutputMessage::TransmitFrame { value, bit_count }) = a_out.try_receive() {
            let _ = b_in.try_send(IrInputMessage::ReceiveFrame(RawCapture {
                kind: CarrierKind::Nec,
                value,
                bit_count,
            }));
        }
        while let Ok(IrOutputMessage::TransmitFrame { value, bit_count }) = b_out.try_receive() {
            let _ = a_in.try_send(IrInputMessage::ReceiveFrame(RawCapture {
                kind: CarrierKind::Nec,
                value,
                bit_count,
            }));
        }
        Timer::after(Duration::from_millis(5)).await;
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    Builder::new().filter_level(LevelFilter::Debug).init();

    log!(Level::Debug, "Starting up");

    let a_output_queue: &'static IrOutputQueue = Box::leak(Box::new(IrOutputQueue::new()));
    let a_input_queue: &'static IrInputQueue = Box::leak(Box::new(IrInputQueue::new()));
    let b_output_queue: &'static IrOutputQueue = Box::leak(Box::new(IrOutputQueue::new()));
    let b_input_queue: &'static IrInputQueue = Box::leak(Box::new(IrInputQueue::new()));

    spawner
        .spawn(medium_task(
            a_output_queue.receiver(),
            a_input_queue.sender(),
            b_output_queue.receiver(),
            b_input_queue.sender(),
        ))
        .unwrap();

    let device_a = IrDevice::with(a_output_queue.sender(), a_input_queue.receiver());
    let device_b = IrDevice::with(b_output_queue.sender(), b_input_queue.receiver());

    let mut player_a: IrLinkManager<LoggingEvents> = IrLinkManager::new();
    player_a.begin(IrLinkConfig::default(), device_a, LoggingEvents(1), 1);

    let mut player_b: IrLinkManager<LoggingEvents> = IrLinkManager::new();
    player_b.begin(IrLinkConfig::default(), device_b, LoggingEvents(2), 2);

    player_a.start_scanning().await.unwrap();

    let mut match_requested = false;
    loop {
        player_a.update().await.unwrap();
        player_b.update().await.unwrap();

        while let Some(message) = player_a.next_message() {
            log!(Level::Info, "[1] received {} from player {}", message.command.name(), message.sender_id);
        }
        while let Some(message) = player_b.next_message() {
            log!(Level::Info, "[2] received {} from player {}", message.command.name(), message.sender_id);
        }

        if player_a.is_connected() && !match_requested {
            log!(
                Level::Info,
                "[1] connected to player {}, requesting match for target 0",
                player_a.connected_player_id().unwrap()
            );
            player_a.perform_match(0).await.unwrap();
            match_requested = true;
        }

        if match_requested && player_a.state() == LinkState::Connected {
            log!(Level::Info, "[1] match confirmed by peer");
            break;
        }

        Timer::after(Duration::from_millis(25)).await;
    }

    // Two bursts from a foreign remote control raise one unlock event on B
    for _ in 0..2 {
        b_input_queue
            .sender()
            .try_send(IrInputMessage::ReceiveFrame(RawCapture {
                kind: CarrierKind::Foreign,
                value: 0x20DF_10EF,
                bit_count: IR_FRAME_BITS,
            }))
            .unwrap();
        player_b.update().await.unwrap();
    }

    if player_b.consume_unlock_event() {
        log!(Level::Info, "[2] unlock event raised after foreign signals");
    }

    log!(Level::Info, "Demo finished");
}
