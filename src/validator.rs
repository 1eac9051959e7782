use crate::{
    chunks::{ihdr::ColorType, ChunkType},
    error::OrderingError,
};

/// How far through the chunk sequence a stream has got.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    #[default]
    Start,
    HeaderSeen,
    PaletteWindow,
    DataPhase,
    /// IDAT chunks are over; only late metadata and IEND may follow.
    Trailer,
    Done,
}

/// Chunks that may appear at most once.
const SINGLETONS: [ChunkType; 13] = [
    ChunkType::IHDR,
    ChunkType::PLTE,
    ChunkType::CgBI,
    ChunkType::tRNS,
    ChunkType::bKGD,
    ChunkType::hIST,
    ChunkType::tIME,
    ChunkType::pHYs,
    ChunkType::gAMA,
    ChunkType::cHRM,
    ChunkType::sRGB,
    ChunkType::iCCP,
    ChunkType::sBIT,
];

/// Chunks that describe the colors PLTE holds, so they come before it.
const BEFORE_PALETTE: [ChunkType; 5] = [
    ChunkType::gAMA,
    ChunkType::cHRM,
    ChunkType::sRGB,
    ChunkType::iCCP,
    ChunkType::sBIT,
];

/// Chunks that refer to PLTE entries, so they come after it.
const AFTER_PALETTE: [ChunkType; 3] = [ChunkType::tRNS, ChunkType::bKGD, ChunkType::hIST];

/// Whether `kind` may still appear once the image data has started.
pub(crate) fn allowed_after_data(kind: ChunkType) -> bool {
    match kind {
        ChunkType::tIME | ChunkType::tEXt | ChunkType::zTXt | ChunkType::iTXt | ChunkType::IEND => {
            true
        }
        ChunkType::pHYs | ChunkType::sPLT => false,
        kind if BEFORE_PALETTE.contains(&kind) || AFTER_PALETTE.contains(&kind) => false,
        kind => !kind.is_critical(),
    }
}

/// Checks chunk types against the ordering rules as they arrive.
///
/// The validator only sees chunk types. Rules that depend on the color type
/// apply once [`set_color_type`](Self::set_color_type) has been called with
/// the parsed header.
#[derive(Debug, Default, Clone)]
pub struct ChunkValidator {
    phase: Phase,
    color_type: Option<ColorType>,
    seen: Vec<ChunkType>,
    /// The chunk that ended the run of IDAT chunks.
    data_ended_by: Option<ChunkType>,
}

impl ChunkValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_color_type(&mut self, color_type: ColorType) {
        self.color_type = Some(color_type);
    }

    fn indexed(&self) -> bool {
        self.color_type == Some(ColorType::IndexedColor)
    }

    fn has_seen(&self, kind: ChunkType) -> bool {
        self.seen.contains(&kind)
    }

    fn forbidden(&self, kind: ChunkType) -> OrderingError {
        OrderingError::ForbiddenChunk {
            chunk: kind,
            color_type: self.color_type.unwrap_or_default(),
        }
    }

    /// Accepts `kind` as the next chunk or says why it can't come here.
    pub fn check(&mut self, kind: ChunkType) -> Result<(), OrderingError> {
        use OrderingError::*;

        if self.phase == Phase::Done {
            return Err(MisplacedChunk {
                chunk: kind,
                before: ChunkType::IEND,
            });
        }
        if SINGLETONS.contains(&kind) && self.has_seen(kind) {
            return Err(DuplicateSingleton(kind));
        }
        let data_started = self.phase >= Phase::DataPhase;
        let misplaced = |before| MisplacedChunk { chunk: kind, before };

        match kind {
            ChunkType::CgBI if self.phase != Phase::Start => {
                return Err(misplaced(ChunkType::IHDR));
            }
            ChunkType::CgBI => {}
            _ if self.phase == Phase::Start && kind != ChunkType::IHDR => {
                return Err(MissingRequired(ChunkType::IHDR));
            }
            ChunkType::IHDR => self.phase = Phase::HeaderSeen,
            ChunkType::PLTE => {
                if data_started {
                    return Err(misplaced(ChunkType::IDAT));
                }
                if self.color_type.is_some() && !self.indexed() {
                    return Err(self.forbidden(kind));
                }
                if let Some(&after) = self.seen.iter().find(|&&k| AFTER_PALETTE.contains(&k)) {
                    return Err(MisplacedChunk {
                        chunk: kind,
                        before: after,
                    });
                }
                self.phase = Phase::PaletteWindow;
            }
            ChunkType::IDAT => match self.phase {
                Phase::DataPhase => {}
                Phase::Trailer => {
                    return Err(MisplacedChunk {
                        chunk: kind,
                        before: self.data_ended_by.unwrap_or(ChunkType::IEND),
                    })
                }
                _ => {
                    if self.indexed() && !self.has_seen(ChunkType::PLTE) {
                        return Err(MissingRequired(ChunkType::PLTE));
                    }
                    self.phase = Phase::DataPhase;
                }
            },
            ChunkType::IEND => {
                if !data_started {
                    return Err(MissingRequired(ChunkType::IDAT));
                }
                self.phase = Phase::Done;
            }
            kind if kind.is_critical() => return Err(UnknownCriticalChunk(kind)),
            kind if BEFORE_PALETTE.contains(&kind) => {
                if data_started {
                    return Err(misplaced(ChunkType::IDAT));
                }
                if self.has_seen(ChunkType::PLTE) {
                    return Err(misplaced(ChunkType::PLTE));
                }
            }
            kind if AFTER_PALETTE.contains(&kind) => {
                if data_started {
                    return Err(misplaced(ChunkType::IDAT));
                }
                let alpha = self.color_type.map_or(false, |c| c.has_alpha());
                if kind == ChunkType::tRNS && alpha {
                    return Err(self.forbidden(kind));
                }
                if kind == ChunkType::hIST && self.color_type.is_some() && !self.indexed() {
                    return Err(self.forbidden(kind));
                }
                if self.indexed() && !self.has_seen(ChunkType::PLTE) {
                    return Err(MisplacedChunk {
                        chunk: ChunkType::PLTE,
                        before: kind,
                    });
                }
            }
            kind if !allowed_after_data(kind) && data_started => {
                return Err(misplaced(ChunkType::IDAT));
            }
            _ => {}
        }

        if self.phase == Phase::DataPhase && kind != ChunkType::IDAT {
            self.phase = if kind == ChunkType::IEND {
                Phase::Done
            } else {
                Phase::Trailer
            };
            self.data_ended_by = Some(kind);
        }
        self.seen.push(kind);
        Ok(())
    }

    /// Confirms the stream reached IEND.
    pub fn finish(&self) -> Result<(), OrderingError> {
        match self.phase {
            Phase::Done => Ok(()),
            Phase::Start => Err(OrderingError::MissingRequired(ChunkType::IHDR)),
            Phase::HeaderSeen | Phase::PaletteWindow => {
                Err(OrderingError::MissingRequired(ChunkType::IDAT))
            }
            Phase::DataPhase | Phase::Trailer => {
                Err(OrderingError::MissingRequired(ChunkType::IEND))
            }
        }
    }
}
