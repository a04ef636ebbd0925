use lobby_client::{Connector, Frame, InMemoryConnector, InMemoryTransport, Transport};

#[tokio::test(flavor = "multi_thread")]
async fn test_pair_delivers_frames_in_order() -> anyhow::Result<()> {
    let (mut client, mut server) = InMemoryTransport::pair();

    client.send_text("one").await?;
    client.send(Frame::Binary(vec![1, 2])).await?;
    client.send_text("two").await?;

    assert_eq!(server.recv().await?, Some(Frame::Text("one".to_string())));
    assert_eq!(server.recv().await?, Some(Frame::Binary(vec![1, 2])));
    assert_eq!(server.recv_text().await?, "two");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_close_ends_peer_stream() -> anyhow::Result<()> {
    let (mut client, mut server) = InMemoryTransport::pair();
    client.close().await?;

    assert_eq!(server.recv().await?, None);
    assert!(client.send_text("late").await.is_err());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connector_refuses_without_queued_connection() -> anyhow::Result<()> {
    let connector = InMemoryConnector::new();
    assert!(connector.connect("mem://lobby").await.is_err());

    let mut server = connector.accept_next();
    let mut client = connector.connect("mem://lobby").await?;
    client.send(Frame::from("hello".to_string())).await?;
    assert_eq!(server.recv_text().await?, "hello");

    assert!(connector.connect("mem://lobby").await.is_err());
    assert_eq!(connector.attempts(), 3);
    Ok(())
}
