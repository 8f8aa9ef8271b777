//! spec.md §8 end-to-end scenario 1: discovery.
//!
//! Consumer with `observedSystems = [1, 20]` starts, waits 12 s, emits a
//! system-advertisement request. Producer with points in systems
//! `{1, 5, 20}` replies. Within 2 s of the next consumer tick,
//! `discoveredSystemNumbers([1, 5, 20])` is emitted and multicast joins
//! are performed for `{1, 20}` only.

mod common;

use common::*;
use otp_core::address::{Address, Priority};
use otp_core::cid::Cid;
use otp_core::config;
use otp_core::consumer::{Consumer, ConsumerSockets};
use otp_core::peer::IpMode;
use otp_core::producer::{Producer, ProducerSockets};
use otp_core::transport::Socket;
use otp_core::{ConsumerConfig, ConsumerEvent, ProducerConfig};

use std::sync::Arc;
use std::time::Duration;

#[test]
fn discovery_reports_union_and_joins_only_observed_systems() {
    let producer_sched = VirtualScheduler::new();
    let producer_adv = RecordingSocket::new("10.0.0.1:6454".parse().unwrap());
    let producer_xform = RecordingSocket::new("10.0.0.1:6455".parse().unwrap());
    let producer = Producer::new(
        ProducerConfig::new("producer", Cid::new_v4(), IpMode::IPv4Only, "eth0", Duration::from_millis(50))
            .unwrap(),
        ProducerSockets {
            advertisement_v4: Some(Arc::clone(&producer_adv) as Arc<dyn Socket>),
            advertisement_v6: None,
            transform_v4: Some(Arc::clone(&producer_xform) as Arc<dyn Socket>),
            transform_v6: None,
        },
        producer_sched.clone(),
        Arc::new(FixedResolver),
        RecordingProducerDelegate::new(),
    );
    for (system, point) in [(1u32, 1u32), (5, 1), (20, 1)] {
        producer
            .add_point(Address::new(system, 1, point).unwrap(), Priority::default(), "p")
            .unwrap();
    }
    producer.start().unwrap();

    let consumer_sched = VirtualScheduler::new();
    let consumer_adv = RecordingSocket::new("10.0.0.2:6454".parse().unwrap());
    let multicast = RecordingMulticastMembership::new();
    let consumer_delegate = RecordingConsumerDelegate::new();
    let consumer = Consumer::new(
        ConsumerConfig::new(
            "consumer",
            Cid::new_v4(),
            IpMode::IPv4Only,
            "eth0",
            vec![],
            vec![1, 20],
            Duration::from_millis(200),
        )
        .unwrap(),
        ConsumerSockets {
            advertisement_v4: Some(Arc::clone(&consumer_adv) as Arc<dyn Socket>),
            advertisement_v6: None,
            multicast_v4: Some(Arc::clone(&multicast) as Arc<dyn otp_core::transport::MulticastMembership>),
            multicast_v6: None,
        },
        consumer_sched.clone(),
        Arc::new(FixedResolver),
        Arc::clone(&consumer_delegate) as Arc<dyn otp_core::ConsumerDelegate>,
        otp_core::modules::ModuleRegistry::new(),
    );
    consumer.start().unwrap();
    consumer_adv.take_sent(); // discard the immediate module-advertisement

    // 12 s initial wait: the consumer's system-advertisement request fires.
    consumer_sched.advance(config::INITIAL_WAIT);
    let requests = consumer_adv.take_sent();
    assert!(!requests.is_empty(), "expected a system-advertisement request after the initial wait");

    for (datagram, _dest) in &requests {
        producer.receive(datagram, "10.0.0.2:6454".parse().unwrap(), false);
    }

    // Producer replies after a random backoff of at most 5 s.
    producer_sched.advance(config::ADVERTISEMENT_REPLY_BACKOFF_MAX + Duration::from_millis(1));
    let replies = producer_adv.take_sent();
    assert!(!replies.is_empty(), "expected a system-advertisement reply");
    for (datagram, _dest) in &replies {
        consumer.receive(datagram, "10.0.0.1:6454".parse().unwrap(), false);
    }

    // 2 s after the request, the consumer notifies discovered systems and
    // resubscribes.
    consumer_sched.advance(config::SYSTEM_ADVERTISEMENT_NOTIFY_DELAY);

    let discovered = consumer_delegate
        .events()
        .into_iter()
        .find_map(|e| match e {
            ConsumerEvent::DiscoveredSystemNumbers(systems) => Some(systems),
            _ => None,
        })
        .expect("discoveredSystemNumbers event");
    assert_eq!(discovered, vec![1, 5, 20]);

    let joined = multicast.joined();
    assert_eq!(joined.len(), 2, "joins should be restricted to observed systems {{1, 20}}");
    let resolver = FixedResolver;
    assert!(joined.contains(&resolver.transform_group(1, false)));
    assert!(joined.contains(&resolver.transform_group(20, false)));
    assert!(!joined.contains(&resolver.transform_group(5, false)));
}
