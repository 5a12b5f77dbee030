//! Operator catalog.
//!
//! Every operator of the library shares the [`Kernel`] contract. Only
//! `affine` has a numeric body so far; the rest bind to
//! [`UnimplementedKernel`], which reports `NnError::Unimplemented`.

use nnkit_core::{NnError, Result, SharedVariable};
use serde::{Deserialize, Serialize};

use crate::affine::{Affine, AffineConfig};
use crate::kernel::{Binding, Kernel};

/// Operator family, as grouped in the function reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Layer,
    Activation,
    Normalization,
    Reduction,
    Arithmetic,
    Logical,
    Math,
    ArrayManipulation,
    Stochasticity,
    Loss,
    Quantization,
    Validation,
    Special,
}

macro_rules! function_kinds {
    ($($category:ident { $($variant:ident => $name:literal,)* })*) => {
        /// Every operator kind the library declares.
        #[allow(clippy::upper_case_acronyms)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum FunctionKind {
            $($($variant,)*)*
        }

        impl FunctionKind {
            pub const ALL: &'static [FunctionKind] = &[$($(FunctionKind::$variant,)*)*];

            /// Stable snake_case name.
            pub fn name(&self) -> &'static str {
                match self {
                    $($(FunctionKind::$variant => $name,)*)*
                }
            }

            pub fn category(&self) -> Category {
                match self {
                    $($(FunctionKind::$variant => Category::$category,)*)*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($($name => Some(FunctionKind::$variant),)*)*
                    _ => None,
                }
            }
        }
    };
}

function_kinds! {
    Layer {
        Convolution => "convolution",
        DepthwiseConvolution => "depthwise_convolution",
        Deconvolution => "deconvolution",
        MaxPooling => "max_pooling",
        AveragePooling => "average_pooling",
        SumPooling => "sum_pooling",
        Unpooling => "unpooling",
        Embed => "embed",
        Affine => "affine",
    }
    Activation {
        Swish => "swish",
        Tanh => "tanh",
        ReLU => "relu",
        LeakyReLU => "leaky_relu",
        Softmax => "softmax",
        ELU => "elu",
        SELU => "selu",
        CReLU => "crelu",
        CELU => "celu",
        PReLU => "prelu",
    }
    Normalization {
        BatchNormalization => "batch_normalization",
        MeanSubtraction => "mean_subtraction",
    }
    Reduction {
        Sum => "sum",
        Mean => "mean",
        Max => "max",
        Min => "min",
        Prod => "prod",
        ReduceSum => "reduce_sum",
        ReduceMean => "reduce_mean",
    }
    Arithmetic {
        Add2 => "add2",
        BcAdd2 => "bc_add2",
        Sub2 => "sub2",
        Mul2 => "mul2",
        Div2 => "div2",
        Pow2 => "pow2",
        AddScalar => "add_scalar",
        MulScalar => "mul_scalar",
        PowScalar => "pow_scalar",
        RSubScalar => "r_sub_scalar",
        RDivScalar => "r_div_scalar",
        RPowScalar => "r_pow_scalar",
    }
    Logical {
        Sign => "sign",
        Minimum2 => "minimum2",
        Maximum2 => "maximum2",
        MinimumScalar => "minimum_scalar",
        MaximumScalar => "maximum_scalar",
        LogicalAnd => "logical_and",
        LogicalOr => "logical_or",
        LogicalXor => "logical_xor",
        Equal => "equal",
        NotEqual => "not_equal",
        GreaterEqual => "greater_equal",
        Greater => "greater",
        LessEqual => "less_equal",
        Less => "less",
        LogicalAndScalar => "logical_and_scalar",
        LogicalOrScalar => "logical_or_scalar",
        LogicalXorScalar => "logical_xor_scalar",
        EqualScalar => "equal_scalar",
        NotEqualScalar => "not_equal_scalar",
        GreaterEqualScalar => "greater_equal_scalar",
        GreaterScalar => "greater_scalar",
        LessEqualScalar => "less_equal_scalar",
        LessScalar => "less_scalar",
        LogicalNot => "logical_not",
    }
    Math {
        Constant => "constant",
        Abs => "abs",
        Exp => "exp",
        Log => "log",
        Identity => "identity",
        BatchMatmul => "batch_matmul",
    }
    ArrayManipulation {
        Concatenate => "concatenate",
        Split => "split",
        Stack => "stack",
        Slice => "slice",
        Transpose => "transpose",
        Broadcast => "broadcast",
        OneHot => "one_hot",
        Flip => "flip",
        Shift => "shift",
        Reshape => "reshape",
        MatrixDiag => "matrix_diag",
        MatrixDiagPart => "matrix_diag_part",
    }
    Stochasticity {
        Dropout => "dropout",
        Rand => "rand",
        Randint => "randint",
        Randn => "randn",
        RandomCrop => "random_crop",
        RandomFlip => "random_flip",
        RandomShift => "random_shift",
        ImageAugmentation => "image_augmentation",
    }
    Loss {
        SigmoidCrossEntropy => "sigmoid_cross_entropy",
        BinaryCrossEntropy => "binary_cross_entropy",
        SoftmaxCrossEntropy => "softmax_cross_entropy",
        CategoricalCrossEntropy => "categorical_cross_entropy",
        SquaredError => "squared_error",
        AbsoluteError => "absolute_error",
        HuberLoss => "huber_loss",
        EpsilonInsensitiveLoss => "epsilon_insensitive_loss",
        KLMultinomial => "kl_multinomial",
    }
    Quantization {
        BinarySigmoid => "binary_sigmoid",
        BinaryTanh => "binary_tanh",
        BinaryConnectAffine => "binary_connect_affine",
        BinaryConnectConvolution => "binary_connect_convolution",
        BinaryWeightAffine => "binary_weight_affine",
        BinaryWeightConvolution => "binary_weight_convolution",
        INQAffine => "inq_affine",
        INQConvolution => "inq_convolution",
        FixedPointQuantize => "fixed_point_quantize",
        Pow2Quantize => "pow2_quantize",
    }
    Validation {
        TopNError => "top_n_error",
        BinaryError => "binary_error",
        ConfusionMatrix => "confusion_matrix",
    }
    Special {
        VATNoise => "vat_noise",
        Unlink => "unlink",
        Sink => "sink",
    }
}

impl FunctionKind {
    /// Whether a kernel with a numeric body exists for this kind.
    pub fn is_implemented(&self) -> bool {
        matches!(self, FunctionKind::Affine)
    }
}

/// Per-operator configuration used to instantiate a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FunctionConfig {
    Affine(AffineConfig),
    /// Stub kernel for `kind`, whether or not it has a numeric body.
    Unimplemented(FunctionKind),
}

impl FunctionConfig {
    pub fn kind(&self) -> FunctionKind {
        match self {
            FunctionConfig::Affine(_) => FunctionKind::Affine,
            FunctionConfig::Unimplemented(kind) => *kind,
        }
    }
}

/// Build an unbound kernel for `config`.
pub fn instantiate(config: FunctionConfig) -> Box<dyn Kernel> {
    match config {
        FunctionConfig::Affine(cfg) => Box::new(Affine::new(cfg)),
        FunctionConfig::Unimplemented(kind) => Box::new(UnimplementedKernel::new(kind)),
    }
}

/// Placeholder for an operator without a numeric body.
///
/// Follows the same lifecycle as a real kernel but never reaches `Bound`.
#[derive(Debug)]
pub struct UnimplementedKernel {
    kind: FunctionKind,
    binding: Binding<()>,
}

impl UnimplementedKernel {
    pub fn new(kind: FunctionKind) -> Self {
        Self {
            kind,
            binding: Binding::Unbound,
        }
    }
}

impl Kernel for UnimplementedKernel {
    fn kind(&self) -> FunctionKind {
        self.kind
    }

    fn bind(&mut self, _inputs: &[SharedVariable], _outputs: &[SharedVariable]) -> Result<()> {
        let name = self.kind.name();
        self.binding.rebind(name, || Err(NnError::Unimplemented(name))).map_err(|e| {
            tracing::warn!("{} bind failed: {}", name, e);
            e
        })
    }

    fn exec(&mut self) -> Result<()> {
        self.binding.state(self.kind.name()).map(|_| ())
    }

    fn release(&mut self) {
        self.binding.release();
    }

    fn is_bound(&self) -> bool {
        self.binding.is_bound()
    }
}
