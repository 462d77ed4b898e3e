use comms::msg::{Command, Msg, Payload};
use tokio::io;

#[tokio::test]
async fn send_recv_contribution() {
    const SIZE: usize = 128;

    let nums = [0.5f32, 1.0, -3.25, 8.0];

    let (one, two) = io::duplex(SIZE);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::framed(rx, tx);

    tx.send(&Msg::Data(Payload::Contribution(&nums)))
        .await
        .unwrap();

    let (rx, tx) = io::split(two);
    let (mut rx, _) = comms::framed(rx, tx);

    let mut rx_buf: Vec<f32> = Vec::new();
    let Msg::Data(Payload::Contribution(got)) = rx.recv_into(&mut rx_buf).await.unwrap() else {
        panic!("expected a contribution");
    };

    assert_eq!(got, &nums);
}

#[tokio::test]
async fn frames_arrive_in_order() {
    let (one, two) = io::duplex(64);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::framed(rx, tx);
    let (rx2, tx2) = io::split(two);
    let (mut rx, _) = comms::framed(rx2, tx2);

    let writer = async move {
        let join = Msg::Control(Command::Join {
            rank: 1,
            world_size: 2,
        });
        tx.send(&join).await?;
        tx.send(&Msg::Data(Payload::Gathered(&[1.0, 2.0, 3.0]))).await?;
        tx.send(&Msg::Err("boom".into())).await?;
        tx.send(&Msg::Control(Command::Disconnect)).await
    };

    let reader = async move {
        let mut rx_buf: Vec<u32> = Vec::new();
        let mut kinds = Vec::new();

        loop {
            let msg: Msg = rx.recv_into(&mut rx_buf).await?;
            kinds.push(msg.kind());

            match msg {
                Msg::Data(Payload::Gathered(nums)) => assert_eq!(nums, &[1.0, 2.0, 3.0]),
                Msg::Err(detail) => assert_eq!(detail, "boom"),
                Msg::Control(Command::Disconnect) => break,
                _ => {}
            }
        }

        Ok::<_, std::io::Error>(kinds)
    };

    let (_, kinds) = tokio::try_join!(writer, reader).unwrap();
    assert_eq!(
        kinds,
        [
            "control/join",
            "data/gathered",
            "err",
            "control/disconnect"
        ]
    );
}
