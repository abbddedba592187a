//! Integration tests for the validate / race / commit protocol

use racechain::blockchain::{Block, Blockchain};
use racechain::config::RaceSettings;
use racechain::miner::{mine_block, Miner, MiningBehavior};
use racechain::participant::Participant;
use racechain::registry::Registry;
use racechain::transaction::{Coin, TransactionPayload, VALID_MESSAGE};
use racechain::transfer::Coordinator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const REWARD: i32 = 10;

/// Helper to build a coordinator over a fresh chain
fn setup(balances: &[(&str, i32)], miners: &[(&str, MiningBehavior)], settings: RaceSettings) -> Coordinator {
    let ledger = Blockchain::new(8).expect("genesis");
    let registry = Registry::new();
    for (name, balance) in balances {
        registry.register_user(name, Coin::from_num(*balance)).expect("register user");
    }
    for (name, behavior) in miners {
        registry
            .add_miner(Miner::with_behavior(*name, Coin::ZERO, *behavior))
            .expect("register miner");
    }
    registry.sync_all(&ledger);
    Coordinator::new(Arc::new(RwLock::new(ledger)), registry, settings)
}

fn three_honest_miners() -> Vec<(&'static str, MiningBehavior)> {
    vec![
        ("Geralt", MiningBehavior::Honest),
        ("Yennefer", MiningBehavior::Honest),
        ("Vesimir", MiningBehavior::Honest),
    ]
}

fn balances(c: &Coordinator) -> Vec<(String, Coin)> {
    c.registry()
        .participants()
        .iter()
        .map(|p| (p.name().to_string(), p.balance()))
        .collect()
}

async fn ledger_len(c: &Coordinator) -> usize {
    c.ledger().read().await.len()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_successful_transfer_with_three_miners() -> Result<(), Box<dyn std::error::Error>> {
    let c = setup(&[("Yoda", 100), ("Ciri", 5)], &three_honest_miners(), RaceSettings::default());
    let yoda = c.registry().get("Yoda").ok_or("missing Yoda")?;
    let ciri = c.registry().get("Ciri").ok_or("missing Ciri")?;

    let receipt = c.transfer(&yoda, &ciri, Coin::from_num(30), Coin::from_num(REWARD)).await;

    assert!(receipt.status, "{}", receipt.message);
    let winner = receipt.miner.clone().ok_or("no miner in receipt")?;
    assert!(["Geralt", "Yennefer", "Vesimir"].contains(&winner.as_str()));
    assert_eq!(receipt.message, format!("{} Mined by {}.", VALID_MESSAGE, winner));

    assert_eq!(yoda.balance(), Coin::from_num(70));
    assert_eq!(ciri.balance(), Coin::from_num(35));

    let rewarded: Vec<_> = c
        .registry()
        .miners()
        .into_iter()
        .filter(|m| m.balance() == Coin::from_num(REWARD))
        .collect();
    assert_eq!(rewarded.len(), 1);
    assert_eq!(rewarded[0].name(), winner);
    for miner in c.registry().miners() {
        if miner.name() != winner {
            assert_eq!(miner.balance(), Coin::ZERO);
            assert_eq!(miner.stats().blocks_won, 0);
        }
    }

    assert_eq!(ledger_len(&c).await, 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_committed_block_reaches_every_view() -> Result<(), Box<dyn std::error::Error>> {
    let c = setup(
        &[("Yoda", 100), ("Ciri", 5), ("Han Solo", 0)],
        &three_honest_miners(),
        RaceSettings::default(),
    );

    let receipt = c.transfer_by_name("Yoda", "Ciri", Coin::from_num(10), Coin::from_num(REWARD)).await;
    assert!(receipt.status);

    let chain = c.ledger().read().await;
    let block = chain.last_block();
    assert_eq!(Some(block.hash_str()), receipt.block_hash);
    let payload = block.payload.as_ref().ok_or("committed block has no payload")?;
    assert_eq!(payload.sender, "Yoda");
    assert_eq!(payload.receiver, "Ciri");
    assert_eq!(payload.amount, Coin::from_num(10));

    for participant in c.registry().participants() {
        assert_eq!(participant.ledger_view().blocks(), chain.blocks(), "{}", participant.name());
    }
    assert!(chain.verify_chain().is_ok());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_insufficient_balance_changes_nothing() {
    let c = setup(&[("Han Solo", 10), ("Ciri", 0)], &three_honest_miners(), RaceSettings::default());
    let before = balances(&c);

    let receipt = c.transfer_by_name("Han Solo", "Ciri", Coin::from_num(50), Coin::from_num(REWARD)).await;

    assert!(!receipt.status);
    assert_eq!(receipt.message, "Sender doesn't have enough coins.");
    assert_eq!(balances(&c), before);
    assert_eq!(ledger_len(&c).await, 1);
    for miner in c.registry().miners() {
        // No race was started
        assert!(miner.stats().last_block_time.is_none());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_zero_and_negative_amounts_change_nothing() {
    let c = setup(&[("Yoda", 100), ("Ciri", 0)], &three_honest_miners(), RaceSettings::default());
    let before = balances(&c);

    for amount in [0, -1, -100] {
        let receipt = c.transfer_by_name("Yoda", "Ciri", Coin::from_num(amount), Coin::from_num(REWARD)).await;
        assert!(!receipt.status);
        assert_eq!(receipt.message, "Transaction does not involve any coin.");
    }

    assert_eq!(balances(&c), before);
    assert_eq!(ledger_len(&c).await, 1);
    for miner in c.registry().miners() {
        assert!(miner.stats().last_block_time.is_none());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_self_transfer_changes_nothing() {
    let c = setup(&[("Yoda", 100)], &three_honest_miners(), RaceSettings::default());
    let before = balances(&c);

    let receipt = c.transfer_by_name("Yoda", "YODA", Coin::from_num(5), Coin::from_num(REWARD)).await;

    assert!(!receipt.status);
    assert_eq!(receipt.message, "Invalid transaction entities.");
    assert_eq!(balances(&c), before);
    assert_eq!(ledger_len(&c).await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_all_miners_failing_changes_nothing() {
    let miners = vec![
        ("Geralt", MiningBehavior::Faulty),
        ("Yennefer", MiningBehavior::Faulty),
        ("Vesimir", MiningBehavior::Faulty),
    ];
    let c = setup(&[("Yoda", 100), ("Ciri", 0)], &miners, RaceSettings::default());
    let before = balances(&c);

    let receipt = c.transfer_by_name("Yoda", "Ciri", Coin::from_num(30), Coin::from_num(REWARD)).await;

    assert!(!receipt.status);
    assert_eq!(receipt.message, VALID_MESSAGE);
    assert_eq!(receipt.miner, None);
    assert_eq!(balances(&c), before);
    assert_eq!(ledger_len(&c).await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slow_miner_still_wins_when_others_fail() {
    let miners = vec![
        ("Geralt", MiningBehavior::Faulty),
        ("Yennefer", MiningBehavior::Delayed(Duration::from_millis(200))),
        ("Vesimir", MiningBehavior::Faulty),
    ];
    let c = setup(&[("Yoda", 100), ("Ciri", 0)], &miners, RaceSettings::default());

    let receipt = c.transfer_by_name("Yoda", "Ciri", Coin::from_num(30), Coin::from_num(REWARD)).await;

    assert!(receipt.status, "{}", receipt.message);
    assert_eq!(receipt.miner.as_deref(), Some("Yennefer"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_race_timeout_fails_transfer() {
    let miners = vec![("Geralt", MiningBehavior::Delayed(Duration::from_secs(30)))];
    let settings = RaceSettings {
        timeout: Duration::from_millis(100),
        ..RaceSettings::default()
    };
    let c = setup(&[("Yoda", 100), ("Ciri", 0)], &miners, settings);
    let before = balances(&c);

    let receipt = c.transfer_by_name("Yoda", "Ciri", Coin::from_num(30), Coin::from_num(REWARD)).await;

    assert!(!receipt.status);
    assert_eq!(receipt.message, VALID_MESSAGE);
    assert_eq!(receipt.miner, None);
    assert_eq!(balances(&c), before);
    assert_eq!(ledger_len(&c).await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stale_block_reports_ledger_rejection() -> Result<(), Box<dyn std::error::Error>> {
    // The only miner is slow enough for a rival block to land mid-race
    let miners = vec![("Geralt", MiningBehavior::Delayed(Duration::from_millis(600)))];
    let c = Arc::new(setup(&[("Yoda", 100), ("Ciri", 0), ("Han Solo", 0)], &miners, RaceSettings::default()));
    let before = balances(&c);

    let transfer = {
        let c = Arc::clone(&c);
        tokio::spawn(async move { c.transfer_by_name("Yoda", "Ciri", Coin::from_num(30), Coin::from_num(REWARD)).await })
    };

    tokio::time::sleep(Duration::from_millis(150)).await;
    {
        let mut chain = c.ledger().write().await;
        let rival = Block::on_tip(&chain.tip(), TransactionPayload::new("Han Solo", "Ciri", Coin::from_num(1)), "Rival");
        chain.append(mine_block(rival)?)?;
    }

    let receipt = transfer.await?;
    assert!(!receipt.status);
    assert!(
        receipt.message.starts_with("Ledger rejected block: Stale chain tip"),
        "{}",
        receipt.message
    );
    assert_eq!(receipt.miner, None);
    assert_eq!(balances(&c), before);
    // Only the rival block was added
    assert_eq!(ledger_len(&c).await, 2);
    let geralt = c.registry().miner("Geralt").ok_or("missing Geralt")?;
    assert_eq!(geralt.stats().blocks_won, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_receiver_overflow_changes_nothing() {
    let c = setup(
        &[("Yoda", 2_000_000_000), ("Ciri", 2_000_000_000)],
        &three_honest_miners(),
        RaceSettings::default(),
    );
    let before = balances(&c);

    let receipt = c
        .transfer_by_name("Yoda", "Ciri", Coin::from_num(1_000_000_000), Coin::from_num(REWARD))
        .await;

    assert!(!receipt.status);
    assert_eq!(receipt.message, "Receiver cannot hold that many coins.");
    assert_eq!(balances(&c), before);
    assert_eq!(ledger_len(&c).await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_transfers_never_overflow_receiver() {
    let c = Arc::new(setup(
        &[("Ciri", 2_000_000_000), ("Yoda", 100_000_000), ("Han Solo", 100_000_000)],
        &three_honest_miners(),
        RaceSettings::default(),
    ));

    let a = {
        let c = Arc::clone(&c);
        tokio::spawn(async move { c.transfer_by_name("Yoda", "Ciri", Coin::from_num(100_000_000), Coin::ZERO).await })
    };
    let b = {
        let c = Arc::clone(&c);
        tokio::spawn(async move { c.transfer_by_name("Han Solo", "Ciri", Coin::from_num(100_000_000), Coin::ZERO).await })
    };
    let receipts = [a.await.expect("task a"), b.await.expect("task b")];

    // Each fits on its own, both together do not
    assert_eq!(receipts.iter().filter(|r| r.status).count(), 1);
    let rejected = receipts.iter().find(|r| !r.status).expect("one rejection");
    assert_eq!(rejected.message, "Receiver cannot hold that many coins.");

    assert_eq!(ledger_len(&c).await, 2);
    assert_eq!(c.registry().get("Ciri").map(|p| p.balance()), Some(Coin::from_num(2_100_000_000)));
    let senders: Vec<_> = ["Yoda", "Han Solo"]
        .iter()
        .filter_map(|name| c.registry().get(name).map(|p| p.balance()))
        .collect();
    assert!(senders.contains(&Coin::ZERO));
    assert!(senders.contains(&Coin::from_num(100_000_000)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_many_miners_commit_exactly_once() {
    let names = ["M0", "M1", "M2", "M3", "M4", "M5", "M6", "M7"];
    let miners: Vec<_> = names.iter().map(|n| (*n, MiningBehavior::Honest)).collect();
    // Low difficulty: most miners finish almost at once
    let c = setup(&[("Yoda", 100), ("Ciri", 0)], &miners, RaceSettings::default());

    let receipt = c.transfer_by_name("Yoda", "Ciri", Coin::from_num(40), Coin::from_num(REWARD)).await;
    assert!(receipt.status);

    let total_won: u64 = c.registry().miners().iter().map(|m| m.stats().blocks_won).sum();
    let total_rewards = c
        .registry()
        .miners()
        .iter()
        .fold(Coin::ZERO, |acc, m| acc + m.balance());
    assert_eq!(total_won, 1);
    assert_eq!(total_rewards, Coin::from_num(REWARD));
    assert_eq!(ledger_len(&c).await, 2);
    assert_eq!(c.registry().get("Yoda").map(|p| p.balance()), Some(Coin::from_num(60)));
    assert_eq!(c.registry().get("Ciri").map(|p| p.balance()), Some(Coin::from_num(40)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sequential_transfers_extend_chain() {
    let c = setup(&[("Yoda", 100), ("Ciri", 0)], &three_honest_miners(), RaceSettings::default());

    for _ in 0..3 {
        let receipt = c.transfer_by_name("Yoda", "Ciri", Coin::from_num(20), Coin::from_num(1)).await;
        assert!(receipt.status, "{}", receipt.message);
    }
    let receipt = c.transfer_by_name("Yoda", "Ciri", Coin::from_num(50), Coin::from_num(1)).await;
    assert!(!receipt.status);

    assert_eq!(ledger_len(&c).await, 4);
    assert_eq!(c.registry().get("Yoda").map(|p| p.balance()), Some(Coin::from_num(40)));
    assert_eq!(c.registry().get("Ciri").map(|p| p.balance()), Some(Coin::from_num(60)));
    assert!(c.ledger().read().await.verify_chain().is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_transfers_never_overdraw() {
    let c = Arc::new(setup(
        &[("Yoda", 100), ("Ciri", 0), ("Han Solo", 0)],
        &three_honest_miners(),
        RaceSettings::default(),
    ));
    let supply_before = c.registry().total_supply();

    let a = {
        let c = Arc::clone(&c);
        tokio::spawn(async move { c.transfer_by_name("Yoda", "Ciri", Coin::from_num(70), Coin::ZERO).await })
    };
    let b = {
        let c = Arc::clone(&c);
        tokio::spawn(async move { c.transfer_by_name("Yoda", "Han Solo", Coin::from_num(70), Coin::ZERO).await })
    };
    let receipts = [a.await.expect("task a"), b.await.expect("task b")];

    let committed = receipts.iter().filter(|r| r.status).count();
    assert!(committed <= 1);
    assert_eq!(ledger_len(&c).await, 1 + committed);
    let yoda = c.registry().get("Yoda").map(|p| p.balance());
    assert_eq!(yoda, Some(Coin::from_num(100 - 70 * committed as i32)));
    assert_eq!(c.registry().total_supply(), supply_before);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_transfers_retry_on_stale_tip() {
    let settings = RaceSettings {
        max_retries: 1,
        ..RaceSettings::default()
    };
    let c = Arc::new(setup(
        &[("Yoda", 100), ("Ciri", 100), ("Han Solo", 0)],
        &three_honest_miners(),
        settings,
    ));

    let a = {
        let c = Arc::clone(&c);
        tokio::spawn(async move { c.transfer_by_name("Yoda", "Han Solo", Coin::from_num(10), Coin::from_num(1)).await })
    };
    let b = {
        let c = Arc::clone(&c);
        tokio::spawn(async move { c.transfer_by_name("Ciri", "Han Solo", Coin::from_num(20), Coin::from_num(1)).await })
    };

    let first = a.await.expect("task a");
    let second = b.await.expect("task b");
    assert!(first.status, "{}", first.message);
    assert!(second.status, "{}", second.message);

    assert_eq!(ledger_len(&c).await, 3);
    assert_eq!(c.registry().get("Han Solo").map(|p| p.balance()), Some(Coin::from_num(30)));
    assert!(c.ledger().read().await.verify_chain().is_ok());
}
