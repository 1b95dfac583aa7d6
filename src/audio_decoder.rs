//! Symphonia-backed decode worker.
//!
//! Turns a [`DecodeRequest`] into a header/samples/footer packet stream on
//! the bus. A decode in progress is abandoned as soon as a newer request or
//! a stop command arrives; the engine drops packets from superseded requests
//! by track id.

use log::{debug, error, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::{FormatOptions, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::protocol::{AudioMessage, AudioPacket, DecodeRequest, Message};

/// Interleaved samples accumulated before each bus send.
const CHUNK_SAMPLES: usize = 32_768;

/// Why a decode loop stopped before the end of the track.
enum DecodeInterrupt {
    Superseded(DecodeRequest),
    Stopped,
}

pub struct AudioDecoder {
    bus_receiver: Receiver<Message>,
    bus_sender: Sender<Message>,
}

impl AudioDecoder {
    pub fn new(bus_receiver: Receiver<Message>, bus_sender: Sender<Message>) -> Self {
        Self {
            bus_receiver,
            bus_sender,
        }
    }

    pub fn run(&mut self) {
        let mut pending: Option<DecodeRequest> = None;
        loop {
            let request = match pending.take() {
                Some(request) => request,
                None => match self.bus_receiver.blocking_recv() {
                    Ok(Message::Audio(AudioMessage::DecodeTrack(request))) => request,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("AudioDecoder: bus receiver lagged, skipped {} messages", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        debug!("AudioDecoder: bus closed, exiting");
                        break;
                    }
                },
            };
            debug!(
                "AudioDecoder: Decoding track {} from {}ms",
                request.track_id, request.start_ms
            );
            if let Some(DecodeInterrupt::Superseded(next)) = self.decode(request) {
                pending = Some(next);
            }
        }
    }

    /// Checks the bus between packets so a stale decode can be abandoned.
    fn poll_interrupt(&mut self) -> Option<DecodeInterrupt> {
        loop {
            match self.bus_receiver.try_recv() {
                Ok(Message::Audio(AudioMessage::DecodeTrack(request))) => {
                    return Some(DecodeInterrupt::Superseded(request));
                }
                Ok(Message::Audio(AudioMessage::StopDecoding)) => {
                    return Some(DecodeInterrupt::Stopped);
                }
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => return Some(DecodeInterrupt::Stopped),
            }
        }
    }

    fn send_packet(&self, packet: AudioPacket) {
        let _ = self
            .bus_sender
            .send(Message::Audio(AudioMessage::Packet(packet)));
    }

    fn decode(&mut self, request: DecodeRequest) -> Option<DecodeInterrupt> {
        let file = match std::fs::File::open(&request.source) {
            Ok(file) => file,
            Err(e) => {
                error!("Failed to open {}: {}", request.source.display(), e);
                return None;
            }
        };

        let media_source = MediaSourceStream::new(Box::new(file), Default::default());
        let hint = Hint::new();

        let mut probed = match symphonia::default::get_probe().format(
            &hint,
            media_source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        ) {
            Ok(probed) => probed,
            Err(e) => {
                error!("Failed to probe {}: {}", request.source.display(), e);
                return None;
            }
        };

        let track = match probed.format.default_track() {
            Some(track) => track,
            None => {
                error!("No default track in {}", request.source.display());
                return None;
            }
        };

        let source_track_id = track.id;
        let sample_rate_hz = track.codec_params.sample_rate.unwrap_or(44_100);
        let channel_count = track
            .codec_params
            .channels
            .map(|channels| channels.count() as u16)
            .unwrap_or(2);
        let duration_ms = match (track.codec_params.n_frames, track.codec_params.sample_rate) {
            (Some(frames), Some(rate)) if rate > 0 => frames * 1_000 / u64::from(rate),
            _ => 0,
        };

        let mut decoder = match symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
        {
            Ok(decoder) => decoder,
            Err(e) => {
                error!("Failed to create decoder: {}", e);
                return None;
            }
        };

        if request.start_ms > 0 {
            let seek_result = probed.format.seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::from(request.start_ms as f64 / 1_000.0),
                    track_id: Some(source_track_id),
                },
            );
            match seek_result {
                Ok(seeked) => {
                    debug!(
                        "AudioDecoder: Seeked {} to ts {}",
                        request.track_id, seeked.actual_ts
                    );
                    decoder.reset();
                }
                Err(e) => {
                    error!("Seek to {}ms failed: {}", request.start_ms, e);
                    // Fall through and decode from wherever the reader is.
                }
            }
        }

        self.send_packet(AudioPacket::TrackHeader {
            track_id: request.track_id.clone(),
            sample_rate_hz,
            channel_count,
            duration_ms,
        });

        let mut chunk: Vec<f32> = Vec::with_capacity(CHUNK_SAMPLES);
        loop {
            if let Some(interrupt) = self.poll_interrupt() {
                debug!("AudioDecoder: Decode of {} interrupted", request.track_id);
                return Some(interrupt);
            }

            let packet = match probed.format.next_packet() {
                Ok(packet) => packet,
                Err(_) => break, // end of stream
            };
            if packet.track_id() != source_track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = decoded.spec();
                    let mut sample_buffer =
                        SampleBuffer::<f32>::new(decoded.capacity() as u64, *spec);
                    sample_buffer.copy_interleaved_ref(decoded);
                    chunk.extend_from_slice(sample_buffer.samples());
                    if chunk.len() >= CHUNK_SAMPLES {
                        self.send_packet(AudioPacket::Samples {
                            track_id: request.track_id.clone(),
                            samples: std::mem::take(&mut chunk),
                        });
                    }
                }
                Err(e) => {
                    error!("Decode error in {}: {}", request.source.display(), e);
                    break;
                }
            }
        }

        if !chunk.is_empty() {
            self.send_packet(AudioPacket::Samples {
                track_id: request.track_id.clone(),
                samples: chunk,
            });
        }
        self.send_packet(AudioPacket::TrackFooter {
            track_id: request.track_id.clone(),
        });
        debug!("AudioDecoder: Finished decoding {}", request.track_id);
        None
    }
}
