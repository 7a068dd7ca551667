use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use srouter_discovery::{HandlerError, Member, MemberHandler, Membership, MembershipConfig};
use srouter_discovery_memory::{MemoryGossip, MemoryNetwork};

struct PrintingHandler;

#[async_trait]
impl MemberHandler for PrintingHandler {
    async fn on_member_join(&self, member: &Member) -> Result<(), HandlerError> {
        println!("  + {} at {} (group {:?})", member.id, member.addr, member.group());
        Ok(())
    }

    async fn on_member_update(&self, member: &Member) -> Result<(), HandlerError> {
        println!("  ~ {} now has tags {:?}", member.id, member.tags());
        Ok(())
    }

    async fn on_member_leave(&self, member: &Member) -> Result<(), HandlerError> {
        println!("  - {}", member.id);
        Ok(())
    }
}

fn router(name: &str, port: u16) -> MembershipConfig {
    MembershipConfig::new(name, format!("0.0.0.0:{port}"), format!("127.0.0.1:{port}")).with_tags(
        HashMap::from([
            ("group".to_string(), "routers".to_string()),
            ("replicas".to_string(), "1".to_string()),
        ]),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let network = MemoryNetwork::new();

    // The first router watches the cluster
    let first = Membership::<MemoryGossip>::new(router("router-1", 7946), network.clone())
        .with_handler(std::sync::Arc::new(PrintingHandler));
    first.start().await?;

    let second = Membership::<MemoryGossip>::new(
        router("router-2", 7947).with_routers("127.0.0.1:7946"),
        network.clone(),
    );
    second.start().await?;

    let third = Membership::<MemoryGossip>::new(
        router("router-3", 7948).with_routers("router-1, router-2"),
        network.clone(),
    );
    third.start().await?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("\nMembers seen by router-1:");
    for member in first.members() {
        println!("  - {} ({})", member.id, member.advertise);
    }

    second
        .update_tags(HashMap::from([(
            "group".to_string(),
            "edge".to_string(),
        )]))
        .await?;
    second.leave().await?;
    third.stop().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("\nMembers left on router-1: {:?}", first.members());

    second.stop().await;
    first.stop().await;

    Ok(())
}
