//! Segment Reassembly
//!
//! Oversized confirmed transfers arrive as a train of ConfirmedRequest or
//! ComplexAck segments sharing an invoke id. The [`SegmentationManager`]
//! accumulates them per `(peer, invoke-id)` transaction, acknowledges each
//! filled window, and on the final segment emits the equivalent unsegmented
//! APDU, which then decodes exactly like a single-packet payload.
//!
//! Segments must arrive strictly in sequence order: the first segment
//! carries sequence number zero and every later one the predecessor plus
//! one. An out-of-order or duplicated segment is reported as a
//! [`ApplicationError::ReassemblyError`] and leaves the buffer untouched, so
//! the peer can retransmit after a negative SegmentAck.
//!
//! Transactions are independent: each buffer has its own lock and the
//! shared map is held only long enough to find or insert an entry. Buffers
//! expire after the application-supplied APDU timeout; expiry discards the
//! buffer and surfaces [`ApplicationError::ReassemblyTimeout`]. The manager
//! never retransmits or retries on its own.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::{Apdu, ApplicationError, MaxApduSize, MaxSegments, Result};
use crate::service::ConfirmedServiceChoice;

/// Identifies one in-flight segmented transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReassemblyKey {
    /// Opaque peer address as supplied by the ingesting layer
    pub peer: Vec<u8>,
    pub invoke_id: u8,
}

/// Which PDU kind is being reassembled; carries the header fields needed to
/// rebuild the unsegmented APDU
#[derive(Debug, Clone)]
enum TransferKind {
    Request {
        segmented_response_accepted: bool,
        max_segments: MaxSegments,
        max_response_size: MaxApduSize,
    },
    Response,
}

#[derive(Debug)]
struct ReassemblyBuffer {
    kind: TransferKind,
    service_choice: ConfirmedServiceChoice,
    invoke_id: u8,
    window_size: u8,
    next_sequence: u8,
    accepted: u32,
    bytes: Vec<u8>,
    last_activity: Instant,
}

/// What a processed segment produced: an acknowledgement to transmit, the
/// completed APDU, or neither (mid-window segment)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentProgress {
    /// SegmentAck to send back, present after each filled window and on the
    /// final segment
    pub segment_ack: Option<Apdu>,
    /// The reassembled, unsegmented APDU, present on the final segment
    pub completed: Option<Apdu>,
}

/// Accumulates segment trains into complete APDUs, one buffer per
/// `(peer, invoke-id)` transaction
#[derive(Debug)]
pub struct SegmentationManager {
    buffers: Mutex<HashMap<ReassemblyKey, Arc<Mutex<ReassemblyBuffer>>>>,
    timeout: Duration,
    max_assembled: usize,
}

impl SegmentationManager {
    /// Total assembled size limit: a full 255-segment train of maximum APDUs
    pub const DEFAULT_MAX_ASSEMBLED: usize = 255 * 1476;

    /// Create a manager with the application's APDU timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            buffers: Mutex::new(HashMap::new()),
            timeout,
            max_assembled: Self::DEFAULT_MAX_ASSEMBLED,
        }
    }

    pub fn with_max_assembled(timeout: Duration, max_assembled: usize) -> Self {
        Self {
            buffers: Mutex::new(HashMap::new()),
            timeout,
            max_assembled,
        }
    }

    /// Number of in-flight transactions
    pub fn active_transfers(&self) -> usize {
        self.buffers.lock().unwrap().len()
    }

    /// Feed one APDU through the manager. Unsegmented APDUs pass through
    /// with empty progress; segments accumulate and may produce a
    /// SegmentAck and, on the final segment, the completed APDU.
    pub fn process(&self, peer: &[u8], apdu: &Apdu) -> Result<SegmentProgress> {
        let (invoke_id, sequence, window, more_follows, service_choice, kind, data) = match apdu {
            Apdu::ConfirmedRequest {
                more_follows,
                segmented_response_accepted,
                max_segments,
                max_response_size,
                invoke_id,
                sequence_number: Some(sequence),
                proposed_window_size,
                service_choice,
                service_data,
            } => (
                *invoke_id,
                *sequence,
                proposed_window_size.unwrap_or(1),
                *more_follows,
                *service_choice,
                TransferKind::Request {
                    segmented_response_accepted: *segmented_response_accepted,
                    max_segments: *max_segments,
                    max_response_size: *max_response_size,
                },
                service_data,
            ),
            Apdu::ComplexAck {
                more_follows,
                invoke_id,
                sequence_number: Some(sequence),
                proposed_window_size,
                service_choice,
                service_data,
            } => (
                *invoke_id,
                *sequence,
                proposed_window_size.unwrap_or(1),
                *more_follows,
                *service_choice,
                TransferKind::Response,
                service_data,
            ),
            _ => return Ok(SegmentProgress::default()),
        };

        let key = ReassemblyKey {
            peer: peer.to_vec(),
            invoke_id,
        };

        let entry = {
            let mut buffers = self.buffers.lock().unwrap();
            match buffers.get(&key) {
                Some(entry) => {
                    let expired =
                        entry.lock().unwrap().last_activity.elapsed() > self.timeout;
                    if expired {
                        buffers.remove(&key);
                        warn!(
                            "reassembly timeout for invoke id {} after {:?}",
                            invoke_id, self.timeout
                        );
                        return Err(ApplicationError::ReassemblyTimeout);
                    }
                    Arc::clone(entry)
                }
                None => {
                    if sequence != 0 {
                        return Err(ApplicationError::UnexpectedFirstSegment(sequence));
                    }
                    debug!(
                        "new reassembly buffer for invoke id {} (window {})",
                        invoke_id, window
                    );
                    let buffer = Arc::new(Mutex::new(ReassemblyBuffer {
                        kind,
                        service_choice,
                        invoke_id,
                        window_size: window,
                        next_sequence: 0,
                        accepted: 0,
                        bytes: Vec::new(),
                        last_activity: Instant::now(),
                    }));
                    buffers.insert(key.clone(), Arc::clone(&buffer));
                    buffer
                }
            }
        };

        let mut buffer = entry.lock().unwrap();

        if sequence != buffer.next_sequence {
            return Err(ApplicationError::ReassemblyError {
                expected: buffer.next_sequence,
                received: sequence,
            });
        }
        if buffer.bytes.len() + data.len() > self.max_assembled {
            // Map lock is only taken after releasing the buffer lock
            drop(buffer);
            self.buffers.lock().unwrap().remove(&key);
            return Err(ApplicationError::MaxApduLengthExceeded);
        }

        buffer.bytes.extend_from_slice(data);
        buffer.next_sequence = sequence.wrapping_add(1);
        buffer.accepted += 1;
        buffer.last_activity = Instant::now();

        let ack_server = matches!(buffer.kind, TransferKind::Request { .. });
        let window_filled =
            buffer.window_size != 0 && buffer.accepted % buffer.window_size as u32 == 0;

        let mut progress = SegmentProgress::default();
        if !more_follows {
            progress.segment_ack = Some(Apdu::SegmentAck {
                negative: false,
                server: ack_server,
                invoke_id: buffer.invoke_id,
                sequence_number: sequence,
                actual_window_size: buffer.window_size,
            });
            progress.completed = Some(buffer.assemble());
            debug!(
                "reassembly complete for invoke id {} ({} segments, {} bytes)",
                invoke_id,
                buffer.accepted,
                buffer.bytes.len()
            );
            drop(buffer);
            self.buffers.lock().unwrap().remove(&key);
        } else if window_filled {
            progress.segment_ack = Some(Apdu::SegmentAck {
                negative: false,
                server: ack_server,
                invoke_id: buffer.invoke_id,
                sequence_number: sequence,
                actual_window_size: buffer.window_size,
            });
        }

        Ok(progress)
    }

    /// The negative SegmentAck requesting retransmission from the last
    /// in-order segment, for replying to an out-of-order arrival
    pub fn negative_ack(&self, peer: &[u8], invoke_id: u8) -> Option<Apdu> {
        let key = ReassemblyKey {
            peer: peer.to_vec(),
            invoke_id,
        };
        let buffers = self.buffers.lock().unwrap();
        let buffer = buffers.get(&key)?.lock().unwrap();
        Some(Apdu::SegmentAck {
            negative: true,
            server: matches!(buffer.kind, TransferKind::Request { .. }),
            invoke_id,
            sequence_number: buffer.next_sequence.wrapping_sub(1),
            actual_window_size: buffer.window_size,
        })
    }

    /// Discard buffers idle longer than the APDU timeout, returning their
    /// keys so the caller can report [`ApplicationError::ReassemblyTimeout`]
    /// per transaction
    pub fn expire_stale(&self) -> Vec<ReassemblyKey> {
        let mut buffers = self.buffers.lock().unwrap();
        let mut expired = Vec::new();
        buffers.retain(|key, entry| {
            let stale = entry.lock().unwrap().last_activity.elapsed() > self.timeout;
            if stale {
                warn!("discarding stale reassembly buffer for invoke id {}", key.invoke_id);
                expired.push(key.clone());
            }
            !stale
        });
        expired
    }

    /// Drop one transaction, e.g. after the peer sent an Abort
    pub fn abort(&self, peer: &[u8], invoke_id: u8) {
        let key = ReassemblyKey {
            peer: peer.to_vec(),
            invoke_id,
        };
        if self.buffers.lock().unwrap().remove(&key).is_some() {
            debug!("aborted reassembly for invoke id {}", invoke_id);
        }
    }
}

impl ReassemblyBuffer {
    /// The unsegmented APDU equivalent to the accumulated train
    fn assemble(&self) -> Apdu {
        match &self.kind {
            TransferKind::Request {
                segmented_response_accepted,
                max_segments,
                max_response_size,
            } => Apdu::ConfirmedRequest {
                more_follows: false,
                segmented_response_accepted: *segmented_response_accepted,
                max_segments: *max_segments,
                max_response_size: *max_response_size,
                invoke_id: self.invoke_id,
                sequence_number: None,
                proposed_window_size: None,
                service_choice: self.service_choice,
                service_data: self.bytes.clone(),
            },
            TransferKind::Response => Apdu::ComplexAck {
                more_follows: false,
                invoke_id: self.invoke_id,
                sequence_number: None,
                proposed_window_size: None,
                service_choice: self.service_choice,
                service_data: self.bytes.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding;
    use crate::object::{ObjectIdentifier, ObjectType};
    use crate::service::{AtomicReadFileAck, ReadFileAckAccess, ServiceAck};

    const PEER: &[u8] = &[192, 168, 1, 20, 0xBA, 0xC0];

    fn read_file_ack_bytes() -> Vec<u8> {
        let ack = AtomicReadFileAck {
            end_of_file: false,
            access: ReadFileAckAccess::Stream {
                file_start_position: 0,
                file_data: (0u8..200).collect(),
            },
        };
        let mut bytes = Vec::new();
        ack.encode(&mut bytes).unwrap();
        bytes
    }

    fn segment(invoke_id: u8, sequence: u8, more_follows: bool, data: &[u8]) -> Apdu {
        Apdu::ComplexAck {
            more_follows,
            invoke_id,
            sequence_number: Some(sequence),
            proposed_window_size: Some(2),
            service_choice: ConfirmedServiceChoice::AtomicReadFile,
            service_data: data.to_vec(),
        }
    }

    #[test]
    fn test_four_segment_read_file_matches_manual_concatenation() {
        let payload = read_file_ack_bytes();
        let chunks: Vec<&[u8]> = payload.chunks(payload.len().div_ceil(4)).collect();
        assert_eq!(chunks.len(), 4);

        let manager = SegmentationManager::new(Duration::from_secs(5));
        let mut completed = None;
        let mut acks = Vec::new();

        for (index, chunk) in chunks.iter().enumerate() {
            let last = index == chunks.len() - 1;
            let progress = manager
                .process(PEER, &segment(11, index as u8, !last, chunk))
                .unwrap();
            if let Some(ack) = progress.segment_ack {
                acks.push(ack);
            }
            if let Some(apdu) = progress.completed {
                completed = Some(apdu);
            }
        }

        // Window size 2: acks after segments 1 and 3 (the final)
        assert_eq!(acks.len(), 2);
        assert_eq!(
            acks[0],
            Apdu::SegmentAck {
                negative: false,
                server: false,
                invoke_id: 11,
                sequence_number: 1,
                actual_window_size: 2,
            }
        );

        let completed = completed.expect("final segment must complete the transfer");
        assert_eq!(manager.active_transfers(), 0);

        // The reassembled APDU must equal one built from the manually
        // concatenated payload
        let expected = Apdu::ComplexAck {
            more_follows: false,
            invoke_id: 11,
            sequence_number: None,
            proposed_window_size: None,
            service_choice: ConfirmedServiceChoice::AtomicReadFile,
            service_data: payload.clone(),
        };
        assert_eq!(completed, expected);

        // And its payload must decode as if it had never been segmented
        match completed.decode_service_ack().unwrap() {
            ServiceAck::AtomicReadFile(ack) => match ack.access {
                ReadFileAckAccess::Stream { file_data, .. } => {
                    assert_eq!(file_data, (0u8..200).collect::<Vec<_>>());
                }
                other => panic!("expected stream access, got {:?}", other),
            },
            other => panic!("expected AtomicReadFile ack, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_order_and_duplicate_segments() {
        let manager = SegmentationManager::new(Duration::from_secs(5));

        manager
            .process(PEER, &segment(3, 0, true, &[1, 2]))
            .unwrap();

        // Skipped ahead
        let err = manager
            .process(PEER, &segment(3, 2, true, &[5, 6]))
            .unwrap_err();
        assert_eq!(
            err,
            ApplicationError::ReassemblyError {
                expected: 1,
                received: 2
            }
        );

        // Duplicate of the first segment
        let err = manager
            .process(PEER, &segment(3, 0, true, &[1, 2]))
            .unwrap_err();
        assert_eq!(
            err,
            ApplicationError::ReassemblyError {
                expected: 1,
                received: 0
            }
        );

        // A negative ack points at the last accepted segment
        assert_eq!(
            manager.negative_ack(PEER, 3),
            Some(Apdu::SegmentAck {
                negative: true,
                server: false,
                invoke_id: 3,
                sequence_number: 0,
                actual_window_size: 2,
            })
        );

        // The buffer survived intact and in-order delivery resumes
        let progress = manager
            .process(PEER, &segment(3, 1, false, &[3, 4]))
            .unwrap();
        let completed = progress.completed.unwrap();
        match completed {
            Apdu::ComplexAck { service_data, .. } => assert_eq!(service_data, vec![1, 2, 3, 4]),
            other => panic!("expected complex ack, got {:?}", other),
        }
    }

    #[test]
    fn test_first_segment_must_be_sequence_zero() {
        let manager = SegmentationManager::new(Duration::from_secs(5));
        let err = manager
            .process(PEER, &segment(9, 4, true, &[0]))
            .unwrap_err();
        assert_eq!(err, ApplicationError::UnexpectedFirstSegment(4));
    }

    #[test]
    fn test_transactions_are_independent() {
        let manager = SegmentationManager::new(Duration::from_secs(5));
        let other_peer: &[u8] = &[10, 0, 0, 7, 0xBA, 0xC0];

        // Interleave two transactions, one per peer, same invoke id
        manager.process(PEER, &segment(5, 0, true, &[1])).unwrap();
        manager
            .process(other_peer, &segment(5, 0, true, &[9]))
            .unwrap();
        assert_eq!(manager.active_transfers(), 2);

        let first = manager
            .process(PEER, &segment(5, 1, false, &[2]))
            .unwrap()
            .completed
            .unwrap();
        let second = manager
            .process(other_peer, &segment(5, 1, false, &[8]))
            .unwrap()
            .completed
            .unwrap();

        match (first, second) {
            (
                Apdu::ComplexAck {
                    service_data: first,
                    ..
                },
                Apdu::ComplexAck {
                    service_data: second,
                    ..
                },
            ) => {
                assert_eq!(first, vec![1, 2]);
                assert_eq!(second, vec![9, 8]);
            }
            other => panic!("expected two complex acks, got {:?}", other),
        }
    }

    #[test]
    fn test_confirmed_request_segments_reassemble_with_server_acks() {
        let manager = SegmentationManager::new(Duration::from_secs(5));

        let request_segment = |sequence: u8, more: bool, data: &[u8]| Apdu::ConfirmedRequest {
            more_follows: more,
            segmented_response_accepted: true,
            max_segments: MaxSegments::Sixteen,
            max_response_size: MaxApduSize::Up1476,
            invoke_id: 77,
            sequence_number: Some(sequence),
            proposed_window_size: Some(4),
            service_choice: ConfirmedServiceChoice::AtomicWriteFile,
            service_data: data.to_vec(),
        };

        let mut write_request = Vec::new();
        ObjectIdentifier::new(ObjectType::File, 1)
            .encode(&mut write_request)
            .unwrap();
        encoding::encode_opening_tag(&mut write_request, 0).unwrap();
        encoding::encode_signed(&mut write_request, 0).unwrap();
        encoding::encode_octet_string(&mut write_request, &[0x55; 32]).unwrap();
        encoding::encode_closing_tag(&mut write_request, 0).unwrap();

        let half = write_request.len() / 2;
        manager
            .process(PEER, &request_segment(0, true, &write_request[..half]))
            .unwrap();
        let progress = manager
            .process(PEER, &request_segment(1, false, &write_request[half..]))
            .unwrap();

        // Acks for request segments come from the server side
        assert!(matches!(
            progress.segment_ack,
            Some(Apdu::SegmentAck { server: true, .. })
        ));
        let completed = progress.completed.unwrap();
        assert!(completed.decode_confirmed_service().is_ok());
    }

    #[test]
    fn test_timeout_discards_buffer() {
        let manager = SegmentationManager::new(Duration::from_millis(1));
        manager.process(PEER, &segment(8, 0, true, &[1])).unwrap();
        assert_eq!(manager.active_transfers(), 1);

        std::thread::sleep(Duration::from_millis(5));

        let expired = manager.expire_stale();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].invoke_id, 8);
        assert_eq!(manager.active_transfers(), 0);

        // A fresh transfer for the same key starts over
        manager.process(PEER, &segment(8, 0, true, &[1])).unwrap();
        assert_eq!(manager.active_transfers(), 1);
    }

    #[test]
    fn test_timeout_reported_on_late_segment() {
        let manager = SegmentationManager::new(Duration::from_millis(1));
        manager.process(PEER, &segment(2, 0, true, &[1])).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let err = manager
            .process(PEER, &segment(2, 1, false, &[2]))
            .unwrap_err();
        assert_eq!(err, ApplicationError::ReassemblyTimeout);
        assert_eq!(manager.active_transfers(), 0);
    }

    #[test]
    fn test_unsegmented_apdu_passes_through() {
        let manager = SegmentationManager::new(Duration::from_secs(5));
        let apdu = Apdu::SimpleAck {
            invoke_id: 1,
            service_choice: ConfirmedServiceChoice::WriteProperty,
        };
        assert_eq!(
            manager.process(PEER, &apdu).unwrap(),
            SegmentProgress::default()
        );
        assert_eq!(manager.active_transfers(), 0);
    }
}
