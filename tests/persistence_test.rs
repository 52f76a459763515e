//! Ledger state must survive closing and reopening the database

use tempfile::TempDir;
use wagerbot::games::Hand;
use wagerbot::{AccountId, Bet, Economy, EconomyConfig};

const ALICE: AccountId = AccountId(1001);
const BOB: AccountId = AccountId(1002);

fn config(dir: &TempDir) -> EconomyConfig {
    EconomyConfig::testing(dir.path().to_string_lossy())
}

#[tokio::test]
async fn balances_and_profiles_survive_restart() {
    let dir = TempDir::new().unwrap();

    let (alice_before, casino_before) = {
        let economy = Economy::open(config(&dir)).await.unwrap();
        economy.accounts().register(ALICE, "@alice").await.unwrap();
        economy.accounts().register(BOB, "bob").await.unwrap();
        economy.payments().pay(ALICE, BOB, 250).await.unwrap();
        economy.play(ALICE, 100, Bet::Rps(Hand::Paper)).await.unwrap();

        (
            economy.balance(ALICE).await.unwrap(),
            economy.balance(AccountId::CASINO).await.unwrap(),
        )
    };

    let economy = Economy::open(config(&dir)).await.unwrap();
    assert_eq!(economy.balance(ALICE).await.unwrap(), alice_before);
    assert_eq!(economy.balance(BOB).await.unwrap(), 1750);
    // the casino is only seeded once
    assert_eq!(economy.balance(AccountId::CASINO).await.unwrap(), casino_before);
    assert_eq!(economy.accounts().find_by_username("alice").await.unwrap(), ALICE);

    let again = economy.accounts().register(ALICE, "alice").await.unwrap();
    assert!(!again.created);
    assert_eq!(again.summary.balance, alice_before);
}

#[tokio::test]
async fn silences_and_cooldowns_survive_restart() {
    let dir = TempDir::new().unwrap();

    {
        let economy = Economy::open(config(&dir)).await.unwrap();
        economy.accounts().register(ALICE, "alice").await.unwrap();
        economy.accounts().register(BOB, "bob").await.unwrap();
        economy.silence().mute(ALICE, BOB, "4m").await.unwrap();
        economy.theft().steal(ALICE, BOB, 10).await.unwrap();
    }

    let economy = Economy::open(config(&dir)).await.unwrap();
    let status = economy.silence().status(BOB).await.unwrap();
    assert!(status.imposed.is_some());
    assert!(economy.theft().cooldown(ALICE).await.unwrap().is_some());
}
