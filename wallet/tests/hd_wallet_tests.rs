//! HD wallet derivation and buffer tests

use bip39::Mnemonic;
use borker_core::network::HARDENED;
use borker_core::Network;
use proptest::prelude::*;
use wallet::{HDWalletError, Wallet};

fn test_words() -> Vec<String> {
    let mut words = vec!["abandon".to_string(); 11];
    words.push("about".to_string());
    words
}

#[test]
fn test_known_addresses_at_path_zero() {
    let wallet = Wallet::new(Some(&test_words())).unwrap();
    let child = wallet.child_at(&[0]).unwrap();
    assert_eq!(child.address(Network::Dogecoin), "DCuKLtD2iahf25s61QtxsLQT1DUpXj1WhQ");
    assert_eq!(child.address(Network::Litecoin), "LSzB4qaDVq3RjtNeSxthbbJcLJ7oQMZMis");
    assert_eq!(child.address(Network::Bitcoin), "18mDodGPRAoNV5gVGpuQKaEr85kXBuz23z");
}

#[test]
fn test_bip44_addresses() {
    let wallet = Wallet::new(Some(&test_words())).unwrap();
    assert_eq!(
        wallet.bip44_child(Network::Bitcoin, 0, 0).unwrap().address(Network::Bitcoin),
        "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA"
    );
    assert_eq!(
        wallet.bip44_child(Network::Dogecoin, 0, 0).unwrap().address(Network::Dogecoin),
        "DBus3bamQjgJULBJtYXpEzDWQRwF5iwxgC"
    );

    let explicit = wallet
        .child_at(&[44 | HARDENED, 3 | HARDENED, HARDENED, 0, 0])
        .unwrap();
    assert_eq!(explicit.address(Network::Dogecoin), "DBus3bamQjgJULBJtYXpEzDWQRwF5iwxgC");
}

#[test]
fn test_derivation_is_stable() {
    let wallet = Wallet::new(None).unwrap();
    let path = [HARDENED, 1, 2];
    let first = wallet.child_at(&path).unwrap();
    let second = wallet.child_at(&path).unwrap();
    assert_eq!(first.public_key(), second.public_key());
    assert_eq!(first.address(Network::Litecoin), second.address(Network::Litecoin));

    let other = wallet.child_at(&[HARDENED, 1, 3]).unwrap();
    assert_ne!(first.public_key(), other.public_key());
}

#[test]
fn test_hardened_and_normal_children_differ() {
    let wallet = Wallet::new(Some(&test_words())).unwrap();
    let normal = wallet.child_at(&[0]).unwrap();
    let hardened = wallet.child_at(&[HARDENED]).unwrap();
    assert_ne!(normal.public_key(), hardened.public_key());
}

#[test]
fn test_restored_wallet_survives_buffer() {
    let wallet = Wallet::new(Some(&test_words())).unwrap();
    let restored = Wallet::from_buffer(&wallet.to_buffer().unwrap()).unwrap();
    assert_eq!(restored.words(), test_words());
    assert_eq!(
        restored.child_at(&[0]).unwrap().address(Network::Dogecoin),
        "DCuKLtD2iahf25s61QtxsLQT1DUpXj1WhQ"
    );
}

#[test]
fn test_wrong_word_count() {
    let words = test_words()[..11].to_vec();
    assert!(matches!(
        Wallet::new(Some(&words)),
        Err(HDWalletError::InvalidMnemonic(_))
    ));
}

proptest! {
    #[test]
    fn prop_buffer_round_trip(
        len in prop::sample::select(vec![16usize, 20, 24, 28, 32]),
        bytes in prop::collection::vec(any::<u8>(), 32),
    ) {
        let mnemonic = Mnemonic::from_entropy(&bytes[..len]).unwrap();
        let words: Vec<String> =
            mnemonic.to_string().split_whitespace().map(str::to_string).collect();

        let wallet = Wallet::new(Some(&words)).unwrap();
        let restored = Wallet::from_buffer(&wallet.to_buffer().unwrap()).unwrap();
        prop_assert_eq!(restored.words(), words);
        prop_assert_eq!(
            restored.child_at(&[7]).unwrap().public_key(),
            wallet.child_at(&[7]).unwrap().public_key()
        );
    }
}
